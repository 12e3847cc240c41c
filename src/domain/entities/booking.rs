use crate::domain::error::DomainError;
use crate::domain::ids::{BookingId, DriverId, OfferId, PassengerId, RequestId};
use crate::domain::values::Price;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Created,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Created => "created",
            BookingStatus::Completed => "completed",
        }
    }
}

/// The result of one successful match
///
/// Only ever produced by [`build_booking`](crate::domain::matching::build_booking);
/// passenger and driver references are denormalised from the request and offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub request_id: RequestId,
    pub offer_id: OfferId,
    pub passenger_id: PassengerId,
    pub driver_id: DriverId,
    /// Agreed price, always the offer's price
    pub price: Price,
    /// `max(0, request.max_price - offer.price)`
    pub platform_margin: Price,
    pub(crate) status: BookingStatus,
}

impl Booking {
    pub fn status(&self) -> BookingStatus {
        self.status
    }

    /// created → completed
    pub fn mark_completed(&mut self) -> Result<(), DomainError> {
        if self.status != BookingStatus::Created {
            return Err(DomainError::InvalidStateTransition {
                entity: "booking",
                id: self.id.to_string(),
                from: self.status.as_str(),
                to: BookingStatus::Completed.as_str(),
            });
        }
        self.status = BookingStatus::Completed;
        Ok(())
    }
}
