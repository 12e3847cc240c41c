//! Identifier types for pickup requests, driver offers and bookings
//!
//! Identities are opaque strings minted by the creation boundary (requests,
//! offers, users) or by an [`IdGenerator`] (bookings). Each kind gets its own
//! newtype so a request id can never be passed where an offer id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of a [`PickupRequest`](super::entities::PickupRequest)
    RequestId
);
string_id!(
    /// Identity of a [`DriverOffer`](super::entities::DriverOffer)
    OfferId
);
string_id!(
    /// Identity of a [`Booking`](super::entities::Booking)
    BookingId
);
string_id!(PassengerId);
string_id!(DriverId);

/// Source of fresh booking identities
pub trait IdGenerator: Send + Sync {
    fn next_booking_id(&self) -> BookingId;
}

/// Random 32-hex-character ids (UUID v4 without hyphens)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_booking_id(&self) -> BookingId {
        BookingId(Uuid::new_v4().simple().to_string())
    }
}

/// Deterministic `{prefix}-{n}` ids, starting at 1
#[derive(Debug)]
pub struct SequenceGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequenceGenerator {
    fn next_booking_id(&self) -> BookingId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        BookingId(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_generator_format() {
        let id = UuidGenerator.next_booking_id();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_uuid_generator_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| UuidGenerator.next_booking_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_sequence_generator() {
        let generator = SequenceGenerator::new("bk");
        assert_eq!(generator.next_booking_id().as_str(), "bk-1");
        assert_eq!(generator.next_booking_id().as_str(), "bk-2");
    }

    #[test]
    fn test_blank_id_is_empty() {
        assert!(RequestId::new("  ").is_empty());
        assert!(!OfferId::new("o-1").is_empty());
    }
}
