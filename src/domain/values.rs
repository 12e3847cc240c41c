//! Value types shared by the entities: fixed-point prices, availability
//! windows and the market key that partitions the order books.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Price per distance unit, stored as integer cents
///
/// Prices arrive as decimals (`12.34`) and are rounded to two places once, at
/// the edge. All comparisons and the offer-index key use the integer so that
/// ordering is exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub const fn from_cents(cents: u64) -> Self {
        Price(cents)
    }

    /// Rounds a decimal amount to cents. Returns `None` for negative,
    /// non-finite or out-of-range input.
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents > u64::MAX as f64 {
            return None;
        }
        Some(Price(cents as u64))
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `self - other`, floored at zero
    pub const fn saturating_sub(self, other: Price) -> Price {
        Price(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Availability window of a driver offer
///
/// When `to` precedes `from` the window is read as spanning midnight: an
/// instant is contained if it is at or after `from` OR at or before `to`.
/// Otherwise containment is the closed range `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn wraps(&self) -> bool {
        self.to < self.from
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        if self.wraps() {
            t >= self.from || t <= self.to
        } else {
            self.from <= t && t <= self.to
        }
    }
}

/// (airport code, vehicle type) pair partitioning both order books
///
/// No matching is ever attempted across two different keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub airport_code: String,
    pub vehicle_type: String,
}

impl MarketKey {
    pub fn new(airport_code: impl Into<String>, vehicle_type: impl Into<String>) -> Self {
        Self {
            airport_code: airport_code.into(),
            vehicle_type: vehicle_type.into(),
        }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.airport_code, self.vehicle_type)
    }
}
