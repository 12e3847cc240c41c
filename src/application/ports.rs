/// Ports - the external collaborators the matching core talks to
///
/// Each port is an async trait so adapters can sit on real I/O (a relational
/// store, a message broker, a remote sorted-set cache) or on in-process
/// structures for tests and the replay driver.
///
/// ## Contracts
/// - [`OrderRepository::save_all`] writes a booking and both updated orders
///   together or not at all
/// - [`EventPublisher::publish`] hands an event to a durable transport with
///   at-least-once delivery
/// - [`BookMirror`] is best-effort: removal of an absent id succeeds, and no
///   result is ever read back into a matching decision
/// - [`EventSource`] yields each delivery at least once; the delivery counts
///   as handled once its [`Acknowledger`] is dropped

use super::error::{MirrorError, PublishError, RepositoryError};
use crate::domain::entities::{Booking, DriverOffer, PickupRequest};
use crate::domain::ids::{BookingId, DriverId, OfferId, PassengerId, RequestId};
use crate::domain::values::MarketKey;
use crate::shared::events::DomainEvent;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save_request(&self, request: &PickupRequest) -> Result<(), RepositoryError>;

    async fn save_offer(&self, offer: &DriverOffer) -> Result<(), RepositoryError>;

    async fn find_request(&self, id: &RequestId) -> Result<Option<PickupRequest>, RepositoryError>;

    async fn find_offer(&self, id: &OfferId) -> Result<Option<DriverOffer>, RepositoryError>;

    async fn find_booking(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;

    async fn list_bookings(&self) -> Result<Vec<Booking>, RepositoryError>;

    /// Whether the passenger has a request in `open` or `matched`
    async fn has_ongoing_request(&self, passenger_id: &PassengerId) -> Result<bool, RepositoryError>;

    /// Whether the driver has an offer in `open` or `matched`
    async fn has_ongoing_offer(&self, driver_id: &DriverId) -> Result<bool, RepositoryError>;

    /// All-or-nothing write of one booking and its request and offer
    async fn save_all(
        &self,
        booking: &Booking,
        request: &PickupRequest,
        offer: &DriverOffer,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}

/// Acknowledges one delivery when dropped (or on [`Acknowledger::ack`])
pub struct Acknowledger(Option<Box<dyn FnOnce() + Send>>);

impl Acknowledger {
    pub fn new(on_ack: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(on_ack)))
    }

    /// A delivery nobody waits on
    pub fn detached() -> Self {
        Self(None)
    }

    pub fn ack(self) {}
}

impl Drop for Acknowledger {
    fn drop(&mut self) {
        if let Some(on_ack) = self.0.take() {
            on_ack();
        }
    }
}

impl fmt::Debug for Acknowledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Acknowledger").field(&self.0.is_some()).finish()
    }
}

/// One event handed to a subscriber
#[derive(Debug)]
pub struct Delivery {
    pub event: DomainEvent,
    pub ack: Acknowledger,
}

impl Delivery {
    pub fn new(event: DomainEvent, ack: Acknowledger) -> Self {
        Self { event, ack }
    }
}

/// Subscriber side of the event transport
#[async_trait]
pub trait EventSource: Send {
    /// Next delivery, or `None` once the transport is closed
    async fn next_delivery(&mut self) -> Option<Delivery>;
}

/// Which order-book side a mirror entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Requests,
    Offers,
}

impl BookSide {
    pub fn as_str(self) -> &'static str {
        match self {
            BookSide::Requests => "requests",
            BookSide::Offers => "offers",
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait BookMirror: Send + Sync {
    async fn add(
        &self,
        market: &MarketKey,
        side: BookSide,
        entity_id: &str,
        sort_key: f64,
        payload: String,
    ) -> Result<(), MirrorError>;

    /// Removes the entry for `entity_id`; succeeds if it is already absent
    async fn remove(&self, market: &MarketKey, side: BookSide, entity_id: &str) -> Result<(), MirrorError>;
}
