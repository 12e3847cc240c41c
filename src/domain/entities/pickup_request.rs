use super::OrderStatus;
use crate::domain::error::DomainError;
use crate::domain::ids::{PassengerId, RequestId};
use crate::domain::values::{MarketKey, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A passenger's request to be picked up at an airport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupRequest {
    pub id: RequestId,
    pub passenger_id: PassengerId,
    pub airport_code: String,
    pub vehicle_type: String,
    pub desired_time: DateTime<Utc>,
    pub max_price: Price,
    pub prefer_high_rating: bool,
    status: OrderStatus,
}

impl PickupRequest {
    /// Creates an `open` request
    pub fn new(
        id: RequestId,
        passenger_id: PassengerId,
        airport_code: impl Into<String>,
        vehicle_type: impl Into<String>,
        desired_time: DateTime<Utc>,
        max_price: Price,
        prefer_high_rating: bool,
    ) -> Self {
        Self {
            id,
            passenger_id,
            airport_code: airport_code.into(),
            vehicle_type: vehicle_type.into(),
            desired_time,
            max_price,
            prefer_high_rating,
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
                entity: "pickup request",
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
    use chrono::TimeZone;

    fn request() -> PickupRequest {
        PickupRequest::new(
            RequestId::new("r-1"),
            PassengerId::new("p-1"),
            "PVG",
            "sedan",
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            Price::from_cents(1000),
            true,
        )
    }

    #[test]
    fn test_new_request_is_open() {
        assert_eq!(request().status(), OrderStatus::Open);
        assert_eq!(request().market_key(), MarketKey::new("PVG", "sedan"));
    }

    #[test]
    fn test_mark_matched_then_completed() {
        let mut r = request();
        r.mark_matched().unwrap();
        assert_eq!(r.status(), OrderStatus::Matched);
        r.mark_completed().unwrap();
        assert_eq!(r.status(), OrderStatus::Completed);
    }

    #[test]
    fn test_mark_matched_twice_fails() {
        let mut r = request();
        r.mark_matched().unwrap();
        let err = r.mark_matched().unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition { from: "matched", to: "matched", .. }
        ));
        assert_eq!(r.status(), OrderStatus::Matched);
    }

    #[test]
    fn test_complete_from_open_fails() {
        let mut r = request();
        assert!(r.mark_completed().is_err());
        assert_eq!(r.status(), OrderStatus::Open);
    }
}
