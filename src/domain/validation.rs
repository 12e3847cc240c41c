/// Event Validator - inbound payload checks
///
/// Turns `RequestCreated` / `OfferCreated` payloads into domain entities, or
/// explains why the payload is malformed. A malformed payload is dropped by
/// the caller with a log line; it never reaches the order books.
///
/// ## Validation Rules
/// - ids, airport code and vehicle type must not be blank
/// - prices must be finite, non-negative and not above the configured cap
/// - rating must lie within the configured bounds
/// - an availability window must not be empty (`from == to`)
/// - status must be `open`
/// - airport must be allowed (empty allow-list means every airport)
///
/// ## Usage
/// ```rust
/// use pickup_matching::domain::validation::EventValidator;
///
/// let validator = EventValidator::new();
/// // let request = validator.validate_request(&payload)?;
/// ```

use crate::domain::entities::{DriverOffer, OrderStatus, PickupRequest};
use crate::domain::values::{AvailabilityWindow, Price};
use crate::shared::events::{OfferCreated, RequestCreated};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid price {value} for {field}")]
    InvalidPrice { field: &'static str, value: f64 },

    #[error("rating {0} out of range")]
    RatingOutOfRange(f64),

    #[error("empty availability window")]
    EmptyWindow,

    #[error("status must be 'open', got '{0}'")]
    UnexpectedStatus(String),

    #[error("airport {0} is not served")]
    UnknownAirport(String),
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Upper bound for any price (inclusive)
    pub max_price: Price,

    pub min_rating: f64,

    pub max_rating: f64,

    /// Allowed airport codes (empty means all airports allowed)
    pub allowed_airports: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_price: Price::from_cents(1_000_000),
            min_rating: 0.0,
            max_rating: 5.0,
            allowed_airports: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventValidator {
    config: ValidationConfig,
}

impl EventValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate_request(&self, event: &RequestCreated) -> Result<PickupRequest, ValidationError> {
        if event.request_id.is_empty() {
            return Err(ValidationError::MissingField("requestId"));
        }
        if event.passenger_id.is_empty() {
            return Err(ValidationError::MissingField("passengerId"));
        }
        self.validate_market(&event.airport_code, &event.vehicle_type)?;
        self.validate_status(&event.status)?;
        let max_price = self.price("maxPrice", event.max_price)?;

        Ok(PickupRequest::new(
            event.request_id.clone(),
            event.passenger_id.clone(),
            event.airport_code.clone(),
            event.vehicle_type.clone(),
            event.desired_time,
            max_price,
            event.prefer_high_rating,
        ))
    }

    pub fn validate_offer(&self, event: &OfferCreated) -> Result<DriverOffer, ValidationError> {
        if event.offer_id.is_empty() {
            return Err(ValidationError::MissingField("offerId"));
        }
        if event.driver_id.is_empty() {
            return Err(ValidationError::MissingField("driverId"));
        }
        self.validate_market(&event.airport_code, &event.vehicle_type)?;
        self.validate_status(&event.status)?;
        let price = self.price("price", event.price)?;

        if !(self.config.min_rating..=self.config.max_rating).contains(&event.rating) {
            return Err(ValidationError::RatingOutOfRange(event.rating));
        }
        if event.available_from == event.available_to {
            return Err(ValidationError::EmptyWindow);
        }

        Ok(DriverOffer::new(
            event.offer_id.clone(),
            event.driver_id.clone(),
            event.airport_code.clone(),
            event.vehicle_type.clone(),
            AvailabilityWindow::new(event.available_from, event.available_to),
            price,
            event.rating,
        ))
    }

    fn validate_market(&self, airport_code: &str, vehicle_type: &str) -> Result<(), ValidationError> {
        if airport_code.trim().is_empty() {
            return Err(ValidationError::MissingField("airportCode"));
        }
        if vehicle_type.trim().is_empty() {
            return Err(ValidationError::MissingField("vehicleType"));
        }
        if !self.config.allowed_airports.is_empty()
            && !self.config.allowed_airports.iter().any(|a| a == airport_code)
        {
            return Err(ValidationError::UnknownAirport(airport_code.to_owned()));
        }
        Ok(())
    }

    fn validate_status(&self, status: &str) -> Result<(), ValidationError> {
        match OrderStatus::parse(status) {
            Some(OrderStatus::Open) => Ok(()),
            _ => Err(ValidationError::UnexpectedStatus(status.to_owned())),
        }
    }

    fn price(&self, field: &'static str, value: f64) -> Result<Price, ValidationError> {
        Price::from_decimal(value)
            .filter(|price| *price <= self.config.max_price)
            .ok_or(ValidationError::InvalidPrice { field, value })
    }
}
