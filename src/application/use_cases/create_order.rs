/// Create Order Use Case
///
/// Entry point for new pickup requests and driver offers.
///
/// ## Workflow
/// 1. Validate the payload (same rules the matcher applies)
/// 2. Reject if the passenger/driver already has an `open` or `matched` order
/// 3. Persist the entity as `open`
/// 4. Publish `RequestCreated` / `OfferCreated`; matching happens downstream
///
/// ## Example
/// ```rust,ignore
/// let use_case = CreateOrderUseCase::new(repo.clone(), bus.clone());
/// let request = use_case.submit_request(payload).await?;
/// ```

use crate::application::error::UseCaseError;
use crate::application::ports::{EventPublisher, OrderRepository};
use crate::domain::entities::{DriverOffer, PickupRequest};
use crate::domain::validation::EventValidator;
use crate::shared::events::{DomainEvent, OfferCreated, RequestCreated};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CreateOrderUseCase<R, P> {
    repository: Arc<R>,
    publisher: Arc<P>,
    validator: EventValidator,
}

impl<R: OrderRepository, P: EventPublisher> CreateOrderUseCase<R, P> {
    pub fn new(repository: Arc<R>, publisher: Arc<P>) -> Self {
        Self {
            repository,
            publisher,
            validator: EventValidator::new(),
        }
    }

    pub fn with_validator(mut self, validator: EventValidator) -> Self {
        self.validator = validator;
        self
    }

    pub async fn submit_request(&self, payload: RequestCreated) -> Result<PickupRequest, UseCaseError> {
        let request = self.validator.validate_request(&payload)?;

        if self.repository.has_ongoing_request(&request.passenger_id).await? {
            warn!(passenger_id = %request.passenger_id, request_id = %request.id, "passenger already has an ongoing request");
            return Err(UseCaseError::AlreadyOngoing(format!("passenger {}", request.passenger_id)));
        }

        self.repository.save_request(&request).await?;
        self.publisher
            .publish(DomainEvent::RequestCreated(RequestCreated::from(&request)))
            .await?;

        debug!(request_id = %request.id, market = %request.market_key(), "request created");
        Ok(request)
    }

    pub async fn submit_offer(&self, payload: OfferCreated) -> Result<DriverOffer, UseCaseError> {
        let offer = self.validator.validate_offer(&payload)?;

        if self.repository.has_ongoing_offer(&offer.driver_id).await? {
            warn!(driver_id = %offer.driver_id, offer_id = %offer.id, "driver already has an ongoing offer");
            return Err(UseCaseError::AlreadyOngoing(format!("driver {}", offer.driver_id)));
        }

        self.repository.save_offer(&offer).await?;
        self.publisher
            .publish(DomainEvent::OfferCreated(OfferCreated::from(&offer)))
            .await?;

        debug!(offer_id = %offer.id, market = %offer.market_key(), "offer created");
        Ok(offer)
    }
}
