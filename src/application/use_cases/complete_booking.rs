/// Complete Booking Use Case
///
/// Closes a booking after the ride: the booking and both of its orders move
/// to `completed` in one atomic write, then `BookingCompleted` is published
/// for settlement.
///
/// A booking that is already completed is refused with
/// [`UseCaseError::InvalidState`]; nothing is written or published.

use crate::application::error::UseCaseError;
use crate::application::ports::{EventPublisher, OrderRepository};
use crate::domain::entities::Booking;
use crate::domain::ids::BookingId;
use crate::shared::events::{BookingCompleted, DomainEvent};
use std::sync::Arc;
use tracing::info;

pub struct CompleteBookingUseCase<R, P> {
    repository: Arc<R>,
    publisher: Arc<P>,
}

impl<R: OrderRepository, P: EventPublisher> CompleteBookingUseCase<R, P> {
    pub fn new(repository: Arc<R>, publisher: Arc<P>) -> Self {
        Self { repository, publisher }
    }

    pub async fn execute(&self, booking_id: &BookingId) -> Result<Booking, UseCaseError> {
        let mut booking = self
            .repository
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("booking {booking_id}")))?;
        let mut request = self
            .repository
            .find_request(&booking.request_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("request {}", booking.request_id)))?;
        let mut offer = self
            .repository
            .find_offer(&booking.offer_id)
            .await?
            .ok_or_else(|| UseCaseError::NotFound(format!("offer {}", booking.offer_id)))?;

        booking.mark_completed()?;
        request.mark_completed()?;
        offer.mark_completed()?;

        self.repository.save_all(&booking, &request, &offer).await?;
        self.publisher
            .publish(DomainEvent::BookingCompleted(BookingCompleted {
                booking_id: booking.id.clone(),
            }))
            .await?;

        info!(booking_id = %booking.id, request_id = %request.id, offer_id = %offer.id, "booking completed");
        Ok(booking)
    }
}
