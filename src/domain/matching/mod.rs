/// Matching algorithm
///
/// - `selection`: hard-constraint filter and preference ranking
/// - [`build_booking`]: turns a matched pair into a [`Booking`]

pub mod selection;

pub use selection::{is_compatible, select_best_offer, select_best_request};

use crate::domain::entities::{Booking, BookingStatus, DriverOffer, PickupRequest};
use crate::domain::ids::IdGenerator;

/// Builds the booking for an already-matched pair
///
/// The agreed price is the offer's price and the platform keeps the gap to
/// the passenger's maximum, floored at zero. No validation is done here; the
/// caller has already established compatibility.
pub fn build_booking(request: &PickupRequest, offer: &DriverOffer, ids: &dyn IdGenerator) -> Booking {
    Booking {
        id: ids.next_booking_id(),
        request_id: request.id.clone(),
        offer_id: offer.id.clone(),
        passenger_id: request.passenger_id.clone(),
        driver_id: offer.driver_id.clone(),
        price: offer.price,
        platform_margin: request.max_price.saturating_sub(offer.price),
        status: BookingStatus::Created,
    }
}
