/// Domain Layer - Core Business Logic
///
/// Pure matching logic with no I/O: entities and their state machines, value
/// types, payload validation, the selection algorithm and the in-memory order
/// books. Everything here is synchronous and can be tested in isolation.
///
/// ## Modules
/// - `entities`: PickupRequest, DriverOffer, Booking
/// - `values`: Price, AvailabilityWindow, MarketKey
/// - `ids`: identity newtypes and booking id generation
/// - `matching`: candidate filtering, ranking and booking construction
/// - `orderbook`: per-market ordered indices
/// - `validation`: inbound event payload checks

pub mod entities;
pub mod error;
pub mod ids;
pub mod matching;
pub mod orderbook;
pub mod validation;
pub mod values;

pub use entities::{Booking, BookingStatus, DriverOffer, OrderStatus, PickupRequest};
pub use error::{ClaimError, DomainError};
pub use ids::{BookingId, DriverId, IdGenerator, OfferId, PassengerId, RequestId, UuidGenerator};
pub use orderbook::{BookDepth, MarketBook};
pub use values::{AvailabilityWindow, MarketKey, Price};
