/// Candidate filtering and ranking
///
/// Pure functions: no I/O, no mutation. The same hard constraints are used in
/// both directions so that "request arrives, scan offers" and "offer arrives,
/// scan requests" agree on which pairs are acceptable.
///
/// ## Hard constraints
/// - same airport code and vehicle type
/// - the offer's availability window contains the request's desired time
///   (wrap-around windows included)
/// - offer price ≤ request maximum price
///
/// ## Ranking (request side)
/// - `prefer_high_rating`: rating descending, then price ascending
/// - otherwise: price ascending, then rating descending
///
/// Remaining ties are broken by offer id so the result does not depend on the
/// order candidates were collected in.

use crate::domain::entities::{DriverOffer, PickupRequest};
use std::cmp::Ordering;

/// Whether `request` and `offer` satisfy each other's hard constraints
#[inline]
pub fn is_compatible(request: &PickupRequest, offer: &DriverOffer) -> bool {
    offer.airport_code == request.airport_code
        && offer.vehicle_type == request.vehicle_type
        && offer.window.contains(request.desired_time)
        && offer.price <= request.max_price
}

/// Picks the best offer for `request` among `candidates`
///
/// Returns `None` when no candidate passes the hard constraints. The returned
/// reference always points into `candidates`.
pub fn select_best_offer<'a, I>(request: &PickupRequest, candidates: I) -> Option<&'a DriverOffer>
where
    I: IntoIterator<Item = &'a DriverOffer>,
{
    candidates
        .into_iter()
        .filter(|offer| is_compatible(request, offer))
        .min_by(|a, b| rank_offers(request.prefer_high_rating, a, b))
}

/// Picks the request a newly arrived `offer` should serve
///
/// A request qualifies when [`select_best_offer`] would accept `offer` for it
/// as the only candidate. Among qualifying requests the earliest desired time
/// wins, ties broken by request id.
pub fn select_best_request<'a, I>(offer: &DriverOffer, candidates: I) -> Option<&'a PickupRequest>
where
    I: IntoIterator<Item = &'a PickupRequest>,
{
    candidates
        .into_iter()
        .filter(|request| select_best_offer(request, std::iter::once(offer)).is_some())
        .min_by(|a, b| {
            a.desired_time
                .cmp(&b.desired_time)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// `Ordering::Less` means `a` ranks ahead of `b`
fn rank_offers(prefer_high_rating: bool, a: &DriverOffer, b: &DriverOffer) -> Ordering {
    let by_rating = b.rating.total_cmp(&a.rating);
    let by_price = a.price.cmp(&b.price);
    let primary = if prefer_high_rating {
        by_rating.then(by_price)
    } else {
        by_price.then(by_rating)
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{DriverId, OfferId, PassengerId, RequestId};
    use crate::domain::values::{AvailabilityWindow, Price};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn request(prefer_high_rating: bool) -> PickupRequest {
        PickupRequest::new(
            RequestId::new("r-1"),
            PassengerId::new("p-1"),
            "PVG",
            "sedan",
            at(10, 0),
            Price::from_cents(1000),
            prefer_high_rating,
        )
    }

    fn offer(id: &str, airport: &str, price: u64, rating: f64) -> DriverOffer {
        DriverOffer::new(
            OfferId::new(id),
            DriverId::new(format!("d-{id}")),
            airport,
            "sedan",
            AvailabilityWindow::new(at(9, 0), at(12, 0)),
            Price::from_cents(price),
            rating,
        )
    }

    #[test]
    fn test_prefers_rating_then_price() {
        let offers = vec![
            offer("a", "PVG", 900, 4.7),
            offer("b", "PVG", 800, 4.9),
        ];
        let best = select_best_offer(&request(true), &offers).unwrap();
        assert_eq!(best.id.as_str(), "b");
    }

    #[test]
    fn test_rating_preference_beats_price() {
        let offers = vec![
            offer("cheap", "PVG", 500, 4.2),
            offer("rated", "PVG", 950, 4.8),
        ];
        assert_eq!(select_best_offer(&request(true), &offers).unwrap().id.as_str(), "rated");
        assert_eq!(select_best_offer(&request(false), &offers).unwrap().id.as_str(), "cheap");
    }

    #[test]
    fn test_equal_price_tie_broken_by_rating() {
        let offers = vec![
            offer("low", "PVG", 800, 4.1),
            offer("high", "PVG", 800, 4.6),
        ];
        assert_eq!(select_best_offer(&request(false), &offers).unwrap().id.as_str(), "high");
    }

    #[test]
    fn test_other_airport_is_no_match() {
        let offers = vec![offer("sha", "SHA", 800, 4.9)];
        assert!(select_best_offer(&request(true), &offers).is_none());
    }

    #[test]
    fn test_price_above_max_is_filtered() {
        let offers = vec![offer("dear", "PVG", 1001, 5.0)];
        assert!(select_best_offer(&request(true), &offers).is_none());

        let offers = vec![offer("exact", "PVG", 1000, 5.0)];
        assert!(select_best_offer(&request(true), &offers).is_some());
    }

    #[test]
    fn test_window_must_contain_desired_time() {
        let mut late = offer("late", "PVG", 800, 4.9);
        late.window = AvailabilityWindow::new(at(11, 0), at(13, 0));
        assert!(select_best_offer(&request(true), std::iter::once(&late)).is_none());
    }

    #[test]
    fn test_wrap_around_window() {
        let mut night = offer("night", "PVG", 800, 4.9);
        night.window = AvailabilityWindow::new(at(22, 0), at(2, 0));
        let mut r = request(false);
        r.desired_time = at(0, 30);
        assert!(select_best_offer(&r, std::iter::once(&night)).is_some());
    }

    #[test]
    fn test_empty_candidates() {
        let offers: Vec<DriverOffer> = Vec::new();
        assert!(select_best_offer(&request(true), &offers).is_none());
    }

    #[test]
    fn test_result_independent_of_candidate_order() {
        let mut offers = vec![
            offer("x", "PVG", 800, 4.5),
            offer("y", "PVG", 800, 4.5),
            offer("z", "PVG", 700, 4.0),
        ];
        let first = select_best_offer(&request(true), &offers).unwrap().id.clone();
        offers.reverse();
        let second = select_best_offer(&request(true), &offers).unwrap().id.clone();
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "x");
    }

    #[test]
    fn test_symmetric_single_pair() {
        let r = request(true);
        let o = offer("o", "PVG", 800, 4.9);
        assert_eq!(select_best_offer(&r, std::iter::once(&o)).map(|o| &o.id), Some(&o.id));
        assert_eq!(select_best_request(&o, std::iter::once(&r)).map(|r| &r.id), Some(&r.id));
    }

    #[test]
    fn test_select_best_request_prefers_earliest() {
        let o = offer("o", "PVG", 800, 4.9);
        let mut early = request(false);
        early.id = RequestId::new("early");
        early.desired_time = at(9, 30);
        let mut late = request(false);
        late.id = RequestId::new("late");
        late.desired_time = at(11, 30);
        let mut cheap = request(false);
        cheap.id = RequestId::new("cheap");
        cheap.desired_time = at(9, 0);
        cheap.max_price = Price::from_cents(700);

        let candidates = vec![late, cheap, early];
        let best = select_best_request(&o, &candidates).unwrap();
        assert_eq!(best.id.as_str(), "early");
    }
}
