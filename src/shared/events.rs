//! Domain events carried by the publish/subscribe transport
//!
//! One closed enum covers every event the matching core consumes or
//! produces; handlers pattern-match on the variant. The JSON form is tagged
//! by `type` with camelCase fields:
//!
//! ```json
//! {"type":"RequestCreated","requestId":"r-1","passengerId":"p-1",
//!  "airportCode":"PVG","vehicleType":"sedan","maxPrice":10.0,
//!  "preferHighRating":true,"desiredTime":"2024-05-01T10:00:00Z","status":"open"}
//! ```

use crate::domain::entities::{DriverOffer, PickupRequest};
use crate::domain::ids::{BookingId, DriverId, OfferId, PassengerId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A passenger created a pickup request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCreated {
    pub request_id: RequestId,
    pub passenger_id: PassengerId,
    pub airport_code: String,
    pub vehicle_type: String,
    pub max_price: f64,
    pub prefer_high_rating: bool,
    pub desired_time: DateTime<Utc>,
    pub status: String,
}

/// A driver created an availability offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCreated {
    pub offer_id: OfferId,
    pub driver_id: DriverId,
    pub airport_code: String,
    pub vehicle_type: String,
    pub available_from: DateTime<Utc>,
    pub available_to: DateTime<Utc>,
    pub price: f64,
    pub rating: f64,
    pub status: String,
}

/// A request and an offer were matched and the booking is durable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matched {
    pub booking_id: BookingId,
    pub request_id: RequestId,
    pub offer_id: OfferId,
}

/// A booking reached `completed`; consumed by settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCompleted {
    pub booking_id: BookingId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    RequestCreated(RequestCreated),
    OfferCreated(OfferCreated),
    Matched(Matched),
    BookingCompleted(BookingCompleted),
}

impl DomainEvent {
    /// Stable label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::RequestCreated(_) => "request_created",
            DomainEvent::OfferCreated(_) => "offer_created",
            DomainEvent::Matched(_) => "matched",
            DomainEvent::BookingCompleted(_) => "booking_completed",
        }
    }

    /// Key used to route the event to a dispatcher partition: the market for
    /// creation events, the booking id otherwise.
    pub fn routing_key(&self) -> String {
        match self {
            DomainEvent::RequestCreated(e) => format!("{}:{}", e.airport_code, e.vehicle_type),
            DomainEvent::OfferCreated(e) => format!("{}:{}", e.airport_code, e.vehicle_type),
            DomainEvent::Matched(e) => e.booking_id.to_string(),
            DomainEvent::BookingCompleted(e) => e.booking_id.to_string(),
        }
    }
}

impl From<&PickupRequest> for RequestCreated {
    fn from(request: &PickupRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            passenger_id: request.passenger_id.clone(),
            airport_code: request.airport_code.clone(),
            vehicle_type: request.vehicle_type.clone(),
            max_price: request.max_price.as_decimal(),
            prefer_high_rating: request.prefer_high_rating,
            desired_time: request.desired_time,
            status: request.status().as_str().to_owned(),
        }
    }
}

impl From<&DriverOffer> for OfferCreated {
    fn from(offer: &DriverOffer) -> Self {
        Self {
            offer_id: offer.id.clone(),
            driver_id: offer.driver_id.clone(),
            airport_code: offer.airport_code.clone(),
            vehicle_type: offer.vehicle_type.clone(),
            available_from: offer.window.from,
            available_to: offer.window.to,
            price: offer.price.as_decimal(),
            rating: offer.rating,
            status: offer.status().as_str().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_created_json_shape() {
        let json = r#"{"type":"RequestCreated","requestId":"r-1","passengerId":"p-1",
            "airportCode":"PVG","vehicleType":"sedan","maxPrice":10.0,
            "preferHighRating":true,"desiredTime":"2024-05-01T10:00:00Z","status":"open"}"#;
        let event: DomainEvent = serde_json::from_str(json).unwrap();
        match &event {
            DomainEvent::RequestCreated(e) => {
                assert_eq!(e.request_id.as_str(), "r-1");
                assert_eq!(e.max_price, 10.0);
                assert!(e.prefer_high_rating);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert_eq!(event.kind(), "request_created");
        assert_eq!(event.routing_key(), "PVG:sedan");
    }

    #[test]
    fn test_matched_serializes_with_tag() {
        let event = DomainEvent::Matched(Matched {
            booking_id: BookingId::new("b-1"),
            request_id: RequestId::new("r-1"),
            offer_id: OfferId::new("o-1"),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"Matched""#));
        assert!(json.contains(r#""bookingId":"b-1""#));
        assert_eq!(event.routing_key(), "b-1");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = r#"{"type":"PaymentSucceeded","bookingId":"b-1"}"#;
        assert!(serde_json::from_str::<DomainEvent>(json).is_err());
    }
}
