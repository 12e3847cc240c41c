/// Market Book - both order-book sides for one (airport, vehicle type) key
///
/// Owns every not-yet-matched request and offer of its market. All methods
/// are synchronous and lock-free; the caller provides mutual exclusion (one
/// exclusive lock per market key).
///
/// ## Candidate collection
/// - request arrives: walk offers by ascending price and stop at the first
///   price above the request's maximum, then filter on airport/vehicle/window
/// - offer arrives: walk requests whose desired time lies in the offer's
///   window (two sub-ranges when the window wraps midnight)
///
/// ## Claiming
/// [`MarketBook::claim`] moves a selected pair out of the book, runs both
/// `mark_matched` transitions on copies and records the ids as claimed, so a
/// redelivered creation event cannot put a matched entity back. Only the most
/// recent claims are remembered (see [`DEFAULT_TOMBSTONE_CAPACITY`]); older
/// redeliveries are caught by the orchestrator against the store. If the
/// durable write later fails, [`MarketBook::release`] puts the open originals
/// back.

use super::index::OrderIndex;
use crate::domain::entities::{DriverOffer, PickupRequest};
use crate::domain::error::ClaimError;
use crate::domain::ids::{OfferId, RequestId};
use crate::domain::matching::{is_compatible, select_best_offer, select_best_request};
use crate::domain::values::MarketKey;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

pub type Candidates<'a, T> = SmallVec<[&'a T; 16]>;

/// Claimed ids remembered per side of one market
pub const DEFAULT_TOMBSTONE_CAPACITY: usize = 4096;

/// Outcome of offering a new entry to the book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Inserted,
    /// Same identity already resting in the book
    AlreadyResident,
    /// Identity was matched earlier; the entry is not re-admitted
    AlreadyClaimed,
}

/// Resting entries per side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BookDepth {
    pub requests: usize,
    pub offers: usize,
}

/// A pair taken out of the book by [`MarketBook::claim`]
#[derive(Debug, Clone)]
pub struct ClaimedPair {
    /// Request after `mark_matched`
    pub request: PickupRequest,
    /// Offer after `mark_matched`
    pub offer: DriverOffer,
    resting_request: PickupRequest,
    resting_offer: DriverOffer,
}

/// Most recently claimed ids; the oldest is forgotten first
#[derive(Debug)]
struct Tombstones<Id> {
    capacity: usize,
    order: VecDeque<Id>,
    ids: HashSet<Id>,
}

impl<Id: Eq + Hash + Clone> Tombstones<Id> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    fn contains(&self, id: &Id) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: Id) {
        if self.capacity == 0 || !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, id: &Id) {
        if self.ids.remove(id) {
            self.order.retain(|kept| kept != id);
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug)]
pub struct MarketBook {
    key: MarketKey,
    requests: OrderIndex<PickupRequest>,
    offers: OrderIndex<DriverOffer>,
    claimed_requests: Tombstones<RequestId>,
    claimed_offers: Tombstones<OfferId>,
}

impl MarketBook {
    pub fn new(key: MarketKey) -> Self {
        Self::with_tombstone_capacity(key, DEFAULT_TOMBSTONE_CAPACITY)
    }

    /// Remembers at most `capacity` claimed ids per side
    pub fn with_tombstone_capacity(key: MarketKey, capacity: usize) -> Self {
        Self {
            key,
            requests: OrderIndex::new(),
            offers: OrderIndex::new(),
            claimed_requests: Tombstones::new(capacity),
            claimed_offers: Tombstones::new(capacity),
        }
    }

    pub fn key(&self) -> &MarketKey {
        &self.key
    }

    pub fn depth(&self) -> BookDepth {
        BookDepth {
            requests: self.requests.len(),
            offers: self.offers.len(),
        }
    }

    /// Claimed ids currently remembered, both sides together
    pub fn tombstones(&self) -> usize {
        self.claimed_requests.len() + self.claimed_offers.len()
    }

    pub fn request(&self, id: &RequestId) -> Option<&PickupRequest> {
        self.requests.get(id)
    }

    pub fn offer(&self, id: &OfferId) -> Option<&DriverOffer> {
        self.offers.get(id)
    }

    pub fn insert_request(&mut self, request: PickupRequest) -> Admission {
        if self.claimed_requests.contains(&request.id) {
            return Admission::AlreadyClaimed;
        }
        if self.requests.insert(request) {
            Admission::Inserted
        } else {
            Admission::AlreadyResident
        }
    }

    pub fn insert_offer(&mut self, offer: DriverOffer) -> Admission {
        if self.claimed_offers.contains(&offer.id) {
            return Admission::AlreadyClaimed;
        }
        if self.offers.insert(offer) {
            Admission::Inserted
        } else {
            Admission::AlreadyResident
        }
    }

    /// Offers that satisfy `request`'s hard constraints, ascending by price
    pub fn collect_offers_for<'a>(&'a self, request: &PickupRequest) -> Candidates<'a, DriverOffer> {
        self.offers
            .iter()
            .take_while(|offer| offer.price <= request.max_price)
            .filter(|offer| is_compatible(request, offer))
            .collect()
    }

    /// Requests whose desired time falls in `offer`'s window and whose
    /// airport/vehicle equal the offer's, ascending by desired time
    pub fn collect_requests_for<'a>(&'a self, offer: &DriverOffer) -> Candidates<'a, PickupRequest> {
        let from = offer.window.from.timestamp_millis();
        let to = offer.window.to.timestamp_millis();
        let same_market = |request: &&PickupRequest| {
            request.airport_code == offer.airport_code && request.vehicle_type == offer.vehicle_type
        };
        if offer.window.wraps() {
            self.requests
                .range(from..)
                .chain(self.requests.range(..=to))
                .filter(same_market)
                .collect()
        } else {
            self.requests.range(from..=to).filter(same_market).collect()
        }
    }

    /// Best resting offer for the resting request `request_id`
    pub fn best_offer_for(&self, request_id: &RequestId) -> Option<OfferId> {
        let request = self.requests.get(request_id)?;
        let candidates = self.collect_offers_for(request);
        select_best_offer(request, candidates).map(|offer| offer.id.clone())
    }

    /// Best resting request for the resting offer `offer_id`
    pub fn best_request_for(&self, offer_id: &OfferId) -> Option<RequestId> {
        let offer = self.offers.get(offer_id)?;
        let candidates = self.collect_requests_for(offer);
        select_best_request(offer, candidates).map(|request| request.id.clone())
    }

    /// Takes the pair out of the book and marks both sides matched
    ///
    /// Fails without touching the book if either entry is missing or either
    /// transition is refused.
    pub fn claim(&mut self, request_id: &RequestId, offer_id: &OfferId) -> Result<ClaimedPair, ClaimError> {
        let resting_request = self
            .requests
            .get(request_id)
            .ok_or_else(|| ClaimError::NotResident(format!("request {request_id}")))?;
        let resting_offer = self
            .offers
            .get(offer_id)
            .ok_or_else(|| ClaimError::NotResident(format!("offer {offer_id}")))?;

        let mut request = resting_request.clone();
        let mut offer = resting_offer.clone();
        request.mark_matched()?;
        offer.mark_matched()?;

        let resting_request = self
            .requests
            .remove(request_id)
            .ok_or_else(|| ClaimError::NotResident(format!("request {request_id}")))?;
        let resting_offer = match self.offers.remove(offer_id) {
            Some(offer) => offer,
            None => {
                self.requests.insert(resting_request);
                return Err(ClaimError::NotResident(format!("offer {offer_id}")));
            }
        };
        self.claimed_requests.insert(request_id.clone());
        self.claimed_offers.insert(offer_id.clone());

        Ok(ClaimedPair {
            request,
            offer,
            resting_request,
            resting_offer,
        })
    }

    /// Undoes a [`claim`](Self::claim): the open originals rest again
    pub fn release(&mut self, pair: ClaimedPair) {
        self.claimed_requests.remove(&pair.resting_request.id);
        self.claimed_offers.remove(&pair.resting_offer.id);
        self.requests.insert(pair.resting_request);
        self.offers.insert(pair.resting_offer);
    }

    /// Drops a request from the book; `None` if it is already gone
    pub fn evict_request(&mut self, id: &RequestId) -> Option<PickupRequest> {
        self.requests.remove(id)
    }

    /// Drops an offer from the book; `None` if it is already gone
    pub fn evict_offer(&mut self, id: &OfferId) -> Option<DriverOffer> {
        self.offers.remove(id)
    }
}
