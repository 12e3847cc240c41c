/// Domain entities and their status state machines
///
/// Requests and offers move strictly `open → matched → completed`; bookings
/// move `created → completed`. Status is the only field that changes after
/// construction; every transition is guarded and fails with
/// [`DomainError::InvalidStateTransition`](super::error::DomainError) without
/// side effects when the source state is wrong.

pub mod booking;
pub mod driver_offer;
pub mod pickup_request;

pub use booking::{Booking, BookingStatus};
pub use driver_offer::DriverOffer;
pub use pickup_request::PickupRequest;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status shared by pickup requests and driver offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Matched,
    Completed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Matched => "matched",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(OrderStatus::Open),
            "matched" => Some(OrderStatus::Matched),
            "completed" => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    /// Open or matched: the owner still has something in flight
    pub fn is_ongoing(self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Matched)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
