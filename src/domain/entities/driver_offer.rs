use super::OrderStatus;
use crate::domain::error::DomainError;
use crate::domain::ids::{DriverId, OfferId};
use crate::domain::values::{AvailabilityWindow, MarketKey, Price};
use serde::{Deserialize, Serialize};

/// A driver's offer to serve airport pickups within a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverOffer {
    pub id: OfferId,
    pub driver_id: DriverId,
    pub airport_code: String,
    pub vehicle_type: String,
    pub window: AvailabilityWindow,
    pub price: Price,
    /// Driver rating at the time the offer was made
    pub rating: f64,
    status: OrderStatus,
}

impl DriverOffer {
    /// Creates an `open` offer
    pub fn new(
        id: OfferId,
        driver_id: DriverId,
        airport_code: impl Into<String>,
        vehicle_type: impl Into<String>,
        window: AvailabilityWindow,
        price: Price,
        rating: f64,
    ) -> Self {
        Self {
            id,
            driver_id,
            airport_code: airport_code.into(),
            vehicle_type: vehicle_type.into(),
            window,
            price,
            rating,
            status: OrderStatus::Open,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn market_key(&self) -> MarketKey {
        MarketKey::new(self.airport_code.clone(), self.vehicle_type.clone())
    }

    /// open → matched
    pub fn mark_matched(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::Open, OrderStatus::Matched)
    }

    /// matched → completed
    pub fn mark_completed(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::Matched, OrderStatus::Completed)
    }

    fn transition(&mut self, from: OrderStatus, to: OrderStatus) -> Result<(), DomainError> {
        if self.status != from {
            return Err(DomainError::InvalidStateTransition {
                entity: "driver offer",
                id: self.id.to_string(),
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn offer() -> DriverOffer {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        DriverOffer::new(
            OfferId::new("o-1"),
            DriverId::new("d-1"),
            "PVG",
            "sedan",
            AvailabilityWindow::new(from, to),
            Price::from_cents(800),
            4.9,
        )
    }

    #[test]
    fn test_offer_lifecycle() {
        let mut o = offer();
        assert_eq!(o.status(), OrderStatus::Open);
        o.mark_matched().unwrap();
        o.mark_completed().unwrap();
        assert_eq!(o.status(), OrderStatus::Completed);
    }

    #[test]
    fn test_invalid_transitions_leave_status() {
        let mut o = offer();
        assert!(o.mark_completed().is_err());
        assert_eq!(o.status(), OrderStatus::Open);

        o.mark_matched().unwrap();
        assert!(o.mark_matched().is_err());
        assert_eq!(o.status(), OrderStatus::Matched);

        o.mark_completed().unwrap();
        assert!(o.mark_completed().is_err());
        assert!(o.mark_matched().is_err());
        assert_eq!(o.status(), OrderStatus::Completed);
    }
}
