/// Matching Service - event-driven matching orchestrator
///
/// Consumes domain events, mutates the per-market order books, runs the
/// selection algorithm and turns a hit into a durable booking.
///
/// ## Per-event protocol (`RequestCreated` / `OfferCreated`)
/// 1. Validate the payload into an entity; drop it if the store already has
///    it past `open` (redelivery older than the book's tombstones)
/// 2. Under the market's write lock: insert, collect opposite-side candidates,
///    rank, claim. Claiming moves both entries out of the book, so no other
///    handler can select them once the lock is released
/// 3. Persist booking + both matched entities in one atomic write. On failure
///    the claim is released and both entries rest again as `open`
/// 4. Publish `Matched`, retrying a bounded number of times
/// 5. Mirror the inserted entity if it still rests (best-effort)
///
/// `Matched` is also consumed here: it evicts both ids from the book (already
/// gone after a local claim) and removes them from the mirror. Both steps are
/// idempotent, so redelivery is harmless.
///
/// A mirror add can land after a concurrent match already cleaned the entity
/// up. Residency is checked again once the add returns and a stale entry is
/// removed right away.
///
/// ## Dependency Injection
/// Generic over the repository, publisher and mirror ports so tests can
/// substitute failing or recording doubles.
///
/// ## Usage
/// ```rust,ignore
/// let service = MatchingService::new(repo, bus, mirror);
/// let outcome = service.handle(event).await?;
/// ```

use super::book_registry::BookRegistry;
use crate::application::error::{MatchingError, PublishError, RepositoryError};
use crate::application::ports::{BookMirror, BookSide, EventPublisher, OrderRepository};
use crate::domain::entities::{Booking, DriverOffer, OrderStatus, PickupRequest};
use crate::domain::ids::{IdGenerator, OfferId, RequestId, UuidGenerator};
use crate::domain::matching::build_booking;
use crate::domain::orderbook::{Admission, BookDepth, BookEntry, ClaimedPair, MarketBook};
use crate::domain::validation::EventValidator;
use crate::domain::values::MarketKey;
use crate::shared::events::{DomainEvent, Matched, OfferCreated, RequestCreated};
use crate::shared::health::HealthChecker;
use crate::shared::metrics::METRICS;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What handling one event did
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Entity inserted, no acceptable counterpart yet
    Resting,
    /// Redelivered creation event; the book was not changed
    Duplicate(Admission),
    /// Booking persisted and `Matched` published
    Matched(Booking),
    /// The selected counterpart could not be claimed; the entity rests
    Conflict,
    /// `Matched` cleanup; number of book entries actually removed
    CleanedUp { evicted: usize },
    /// Event is not consumed by the matcher
    Ignored,
}

/// How hard to try publishing `Matched` once the booking is durable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRetry {
    /// Total attempts, the first one included
    pub attempts: u32,
    /// Wait before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for PublishRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(20),
        }
    }
}

/// Result of the critical section for one creation event
enum Decision {
    Duplicate(Admission),
    Resting,
    Claimed(ClaimedPair),
    Conflict,
}

pub struct MatchingService<R, P, M> {
    books: Arc<BookRegistry>,
    repository: Arc<R>,
    publisher: Arc<P>,
    mirror: Arc<M>,
    validator: EventValidator,
    ids: Arc<dyn IdGenerator>,
    health: Arc<HealthChecker>,
    publish_retry: PublishRetry,
}

impl<R, P, M> MatchingService<R, P, M>
where
    R: OrderRepository,
    P: EventPublisher,
    M: BookMirror,
{
    pub fn new(repository: Arc<R>, publisher: Arc<P>, mirror: Arc<M>) -> Self {
        Self {
            books: Arc::new(BookRegistry::new()),
            repository,
            publisher,
            mirror,
            validator: EventValidator::new(),
            ids: Arc::new(UuidGenerator),
            health: Arc::new(HealthChecker::default()),
            publish_retry: PublishRetry::default(),
        }
    }

    pub fn with_validator(mut self, validator: EventValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Shares an existing registry (e.g. with the diagnostics server)
    pub fn with_books(mut self, books: Arc<BookRegistry>) -> Self {
        self.books = books;
        self
    }

    /// Reports store and mirror outcomes into `health`
    pub fn with_health(mut self, health: Arc<HealthChecker>) -> Self {
        self.health = health;
        self
    }

    pub fn with_publish_retry(mut self, retry: PublishRetry) -> Self {
        self.publish_retry = PublishRetry {
            attempts: retry.attempts.max(1),
            backoff: retry.backoff,
        };
        self
    }

    pub fn books(&self) -> &Arc<BookRegistry> {
        &self.books
    }

    pub fn health(&self) -> &Arc<HealthChecker> {
        &self.health
    }

    pub async fn handle(&self, event: DomainEvent) -> Result<MatchOutcome, MatchingError> {
        METRICS.events_total.with_label_values(&[event.kind()]).inc();
        match event {
            DomainEvent::RequestCreated(payload) => self.on_request_created(&payload).await,
            DomainEvent::OfferCreated(payload) => self.on_offer_created(&payload).await,
            DomainEvent::Matched(payload) => self.on_matched(&payload).await,
            DomainEvent::BookingCompleted(_) => Ok(MatchOutcome::Ignored),
        }
    }

    async fn on_request_created(&self, payload: &RequestCreated) -> Result<MatchOutcome, MatchingError> {
        let request = self.validator.validate_request(payload).map_err(|e| {
            warn!(request_id = %payload.request_id, error = %e, "dropping malformed request");
            METRICS.failure("validation");
            e
        })?;
        let stored = self
            .repository
            .find_request(&request.id)
            .await
            .map(|found| found.map(|r| r.status()));
        if self.settled(request.id.as_str(), stored) {
            debug!(request_id = %request.id, "request already settled in the store");
            return Ok(MatchOutcome::Duplicate(Admission::AlreadyClaimed));
        }
        let key = request.market_key();
        let book = self.books.book(&key);

        let decision = {
            let timer = METRICS
                .matching_duration
                .with_label_values(&[key.airport_code.as_str()])
                .start_timer();
            let mut book = book.write();
            let decision = match book.insert_request(request.clone()) {
                Admission::Inserted => match book.best_offer_for(&request.id) {
                    None => Decision::Resting,
                    Some(offer_id) => match book.claim(&request.id, &offer_id) {
                        Ok(pair) => Decision::Claimed(pair),
                        Err(e) => {
                            warn!(market = %key, request_id = %request.id, offer_id = %offer_id, error = %e, "claim refused");
                            Decision::Conflict
                        }
                    },
                },
                admission => Decision::Duplicate(admission),
            };
            record_depth(&key, book.depth());
            timer.observe_duration();
            decision
        };

        if let Decision::Duplicate(admission) = decision {
            debug!(market = %key, request_id = %request.id, ?admission, "request already known");
            return Ok(MatchOutcome::Duplicate(admission));
        }
        let outcome = self.settle(&key, decision).await;
        self.mirror_add(&key, &request).await;
        outcome
    }

    async fn on_offer_created(&self, payload: &OfferCreated) -> Result<MatchOutcome, MatchingError> {
        let offer = self.validator.validate_offer(payload).map_err(|e| {
            warn!(offer_id = %payload.offer_id, error = %e, "dropping malformed offer");
            METRICS.failure("validation");
            e
        })?;
        let stored = self
            .repository
            .find_offer(&offer.id)
            .await
            .map(|found| found.map(|o| o.status()));
        if self.settled(offer.id.as_str(), stored) {
            debug!(offer_id = %offer.id, "offer already settled in the store");
            return Ok(MatchOutcome::Duplicate(Admission::AlreadyClaimed));
        }
        let key = offer.market_key();
        let book = self.books.book(&key);

        let decision = {
            let timer = METRICS
                .matching_duration
                .with_label_values(&[key.airport_code.as_str()])
                .start_timer();
            let mut book = book.write();
            let decision = match book.insert_offer(offer.clone()) {
                Admission::Inserted => match book.best_request_for(&offer.id) {
                    None => Decision::Resting,
                    Some(request_id) => match book.claim(&request_id, &offer.id) {
                        Ok(pair) => Decision::Claimed(pair),
                        Err(e) => {
                            warn!(market = %key, request_id = %request_id, offer_id = %offer.id, error = %e, "claim refused");
                            Decision::Conflict
                        }
                    },
                },
                admission => Decision::Duplicate(admission),
            };
            record_depth(&key, book.depth());
            timer.observe_duration();
            decision
        };

        if let Decision::Duplicate(admission) = decision {
            debug!(market = %key, offer_id = %offer.id, ?admission, "offer already known");
            return Ok(MatchOutcome::Duplicate(admission));
        }
        let outcome = self.settle(&key, decision).await;
        self.mirror_add(&key, &offer).await;
        outcome
    }

    /// True when the store holds the entity in a state past `open`. A failed
    /// lookup falls back to the book's own duplicate detection.
    fn settled(&self, id: &str, stored: Result<Option<OrderStatus>, RepositoryError>) -> bool {
        match stored {
            Ok(status) => {
                self.health.record_store(true);
                matches!(status, Some(status) if status != OrderStatus::Open)
            }
            Err(e) => {
                warn!(entity_id = %id, error = %e, "store lookup failed, relying on the book");
                METRICS.failure("lookup");
                self.health.record_store(false);
                false
            }
        }
    }

    /// Everything after the critical section: commit a claim, or report why
    /// the entity rests
    async fn settle(&self, key: &MarketKey, decision: Decision) -> Result<MatchOutcome, MatchingError> {
        match decision {
            Decision::Resting => {
                debug!(market = %key, "no acceptable counterpart, resting");
                Ok(MatchOutcome::Resting)
            }
            Decision::Conflict => {
                METRICS
                    .claim_conflicts_total
                    .with_label_values(&[key.airport_code.as_str(), key.vehicle_type.as_str()])
                    .inc();
                Ok(MatchOutcome::Conflict)
            }
            Decision::Claimed(pair) => self.commit(key, pair).await,
            Decision::Duplicate(admission) => Ok(MatchOutcome::Duplicate(admission)),
        }
    }

    async fn commit(&self, key: &MarketKey, pair: ClaimedPair) -> Result<MatchOutcome, MatchingError> {
        let booking = build_booking(&pair.request, &pair.offer, self.ids.as_ref());

        if let Err(e) = self
            .repository
            .save_all(&booking, &pair.request, &pair.offer)
            .await
        {
            error!(
                market = %key,
                booking_id = %booking.id,
                request_id = %pair.request.id,
                offer_id = %pair.offer.id,
                error = %e,
                "booking write failed, releasing claim"
            );
            METRICS.failure("persistence");
            self.health.record_store(false);
            let book = self.books.book(key);
            let mut book = book.write();
            book.release(pair);
            record_depth(key, book.depth());
            return Err(MatchingError::Persistence(e));
        }
        self.health.record_store(true);

        info!(
            market = %key,
            booking_id = %booking.id,
            request_id = %booking.request_id,
            offer_id = %booking.offer_id,
            price = %booking.price,
            margin = %booking.platform_margin,
            "matched"
        );
        METRICS
            .matches_total
            .with_label_values(&[key.airport_code.as_str(), key.vehicle_type.as_str()])
            .inc();

        let matched = Matched {
            booking_id: booking.id.clone(),
            request_id: booking.request_id.clone(),
            offer_id: booking.offer_id.clone(),
        };
        if let Err(e) = self.publish_matched(&matched).await {
            error!(booking_id = %booking.id, error = %e, "match event not published, cleaning up inline");
            METRICS.failure("publish");
            self.cleanup(key, &booking.request_id, &booking.offer_id).await;
            return Err(MatchingError::Publish(e));
        }

        Ok(MatchOutcome::Matched(booking))
    }

    /// Publishes `Matched`, retrying transport errors; a closed transport is
    /// final
    async fn publish_matched(&self, matched: &Matched) -> Result<(), PublishError> {
        let mut attempt = 1;
        loop {
            match self.publisher.publish(DomainEvent::Matched(matched.clone())).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.publish_retry.attempts && !matches!(e, PublishError::Closed) => {
                    warn!(booking_id = %matched.booking_id, attempt, error = %e, "publish failed, retrying");
                    tokio::time::sleep(self.publish_retry.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn on_matched(&self, payload: &Matched) -> Result<MatchOutcome, MatchingError> {
        let key = match self.market_of(payload).await {
            Ok(Some(key)) => key,
            Ok(None) => {
                warn!(booking_id = %payload.booking_id, "matched entities unknown to the store, nothing to clean");
                return Ok(MatchOutcome::Ignored);
            }
            Err(e) => {
                error!(booking_id = %payload.booking_id, error = %e, "cannot locate the matched market");
                METRICS.failure("lookup");
                self.health.record_store(false);
                return Err(MatchingError::Repository(e));
            }
        };
        self.health.record_store(true);
        let evicted = self.cleanup(&key, &payload.request_id, &payload.offer_id).await;
        debug!(market = %key, booking_id = %payload.booking_id, evicted, "cleanup done");
        Ok(MatchOutcome::CleanedUp { evicted })
    }

    async fn market_of(&self, payload: &Matched) -> Result<Option<MarketKey>, RepositoryError> {
        if let Some(request) = self.repository.find_request(&payload.request_id).await? {
            return Ok(Some(request.market_key()));
        }
        let offer = self.repository.find_offer(&payload.offer_id).await?;
        Ok(offer.map(|offer| offer.market_key()))
    }

    /// Evicts both ids from the book and the mirror; returns how many book
    /// entries were still resident
    async fn cleanup(&self, key: &MarketKey, request_id: &RequestId, offer_id: &OfferId) -> usize {
        let mut evicted = 0;
        if let Some(book) = self.books.existing(key) {
            let mut book = book.write();
            evicted += usize::from(book.evict_request(request_id).is_some());
            evicted += usize::from(book.evict_offer(offer_id).is_some());
            record_depth(key, book.depth());
        }
        self.mirror_remove(key, BookSide::Requests, request_id.as_str()).await;
        self.mirror_remove(key, BookSide::Offers, offer_id.as_str()).await;
        evicted
    }

    fn is_resident<E: Mirrored>(&self, key: &MarketKey, entity: &E) -> bool {
        match self.books.existing(key) {
            Some(book) => {
                let book = book.read();
                entity.is_resident(&book)
            }
            None => false,
        }
    }

    async fn mirror_add<E: Mirrored>(&self, key: &MarketKey, entity: &E) {
        // matched in the same critical section: never visible as resting
        if !self.is_resident(key, entity) {
            return;
        }
        let side = E::SIDE;
        let id = entity.entry_id().to_string();
        let payload = match serde_json::to_string(entity) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(market = %key, %side, entity_id = %id, error = %e, "mirror payload not serializable");
                METRICS.failure("mirror_add");
                return;
            }
        };
        if let Err(e) = self.mirror.add(key, side, &id, entity.sort_key(), payload).await {
            warn!(market = %key, %side, entity_id = %id, error = %e, "mirror add failed");
            METRICS.failure("mirror_add");
            self.health.record_mirror(false);
            return;
        }
        self.health.record_mirror(true);

        if !self.is_resident(key, entity) {
            debug!(market = %key, %side, entity_id = %id, "entity matched while the mirror add was in flight");
            self.mirror_remove(key, side, &id).await;
        }
    }

    async fn mirror_remove(&self, key: &MarketKey, side: BookSide, id: &str) {
        match self.mirror.remove(key, side, id).await {
            Ok(()) => self.health.record_mirror(true),
            Err(e) => {
                warn!(market = %key, %side, entity_id = %id, error = %e, "mirror remove failed");
                METRICS.failure("mirror_remove");
                self.health.record_mirror(false);
            }
        }
    }
}

/// How an entity appears in the mirror: its side, its score (the same order
/// as the in-memory index) and whether the book still holds it
trait Mirrored: BookEntry + Serialize {
    const SIDE: BookSide;

    fn sort_key(&self) -> f64;

    fn is_resident(&self, book: &MarketBook) -> bool;
}

impl Mirrored for PickupRequest {
    const SIDE: BookSide = BookSide::Requests;

    fn sort_key(&self) -> f64 {
        self.index_key() as f64
    }

    fn is_resident(&self, book: &MarketBook) -> bool {
        book.request(&self.id).is_some()
    }
}

impl Mirrored for DriverOffer {
    const SIDE: BookSide = BookSide::Offers;

    fn sort_key(&self) -> f64 {
        self.index_key() as f64
    }

    fn is_resident(&self, book: &MarketBook) -> bool {
        book.offer(&self.id).is_some()
    }
}

fn record_depth(key: &MarketKey, depth: BookDepth) {
    METRICS
        .book_depth
        .with_label_values(&[key.airport_code.as_str(), key.vehicle_type.as_str(), "requests"])
        .set(depth.requests as f64);
    METRICS
        .book_depth
        .with_label_values(&[key.airport_code.as_str(), key.vehicle_type.as_str(), "offers"])
        .set(depth.offers as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{DriverId, PassengerId, SequenceGenerator};
    use crate::infrastructure::eventbus::InMemoryEventBus;
    use crate::infrastructure::mirror::InMemorySortedSetMirror;
    use crate::infrastructure::persistence::InMemoryOrderRepository;
    use chrono::{DateTime, TimeZone, Utc};

    type Service = MatchingService<InMemoryOrderRepository, InMemoryEventBus, InMemorySortedSetMirror>;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn service() -> (Service, Arc<InMemoryOrderRepository>, Arc<InMemorySortedSetMirror>) {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let mirror = Arc::new(InMemorySortedSetMirror::new());
        let service = MatchingService::new(repo.clone(), bus, mirror.clone())
            .with_id_generator(Arc::new(SequenceGenerator::new("b")));
        (service, repo, mirror)
    }

    fn request(id: &str, max_price: f64) -> RequestCreated {
        RequestCreated {
            request_id: RequestId::new(id),
            passenger_id: PassengerId::new(format!("p-{id}")),
            airport_code: "PVG".into(),
            vehicle_type: "sedan".into(),
            max_price,
            prefer_high_rating: true,
            desired_time: at(10, 0),
            status: "open".into(),
        }
    }

    fn offer(id: &str, price: f64, rating: f64) -> OfferCreated {
        OfferCreated {
            offer_id: OfferId::new(id),
            driver_id: DriverId::new(format!("d-{id}")),
            airport_code: "PVG".into(),
            vehicle_type: "sedan".into(),
            available_from: at(9, 0),
            available_to: at(12, 0),
            price,
            rating,
            status: "open".into(),
        }
    }

    fn depth(service: &Service) -> BookDepth {
        service
            .books()
            .existing(&MarketKey::new("PVG", "sedan"))
            .map(|book| book.read().depth())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_request_rests_without_offers() {
        let (service, _, mirror) = service();
        let outcome = service.handle(DomainEvent::RequestCreated(request("r", 10.0))).await.unwrap();
        assert_eq!(outcome, MatchOutcome::Resting);
        assert_eq!(depth(&service), BookDepth { requests: 1, offers: 0 });
        assert_eq!(mirror.len(&MarketKey::new("PVG", "sedan"), BookSide::Requests), 1);
    }

    #[tokio::test]
    async fn test_offer_matches_resting_request() {
        let (service, repo, _) = service();
        service.handle(DomainEvent::RequestCreated(request("r", 10.0))).await.unwrap();

        let outcome = service.handle(DomainEvent::OfferCreated(offer("o", 8.0, 4.9))).await.unwrap();
        let booking = match outcome {
            MatchOutcome::Matched(booking) => booking,
            other => panic!("expected a match, got {:?}", other),
        };
        assert_eq!(booking.id.as_str(), "b-1");
        assert_eq!(booking.platform_margin.cents(), 200);
        assert_eq!(depth(&service), BookDepth::default());
        assert!(repo.find_booking(&booking.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_redelivered_request_is_noop() {
        let (service, _, _) = service();
        service.handle(DomainEvent::RequestCreated(request("r", 10.0))).await.unwrap();
        let outcome = service.handle(DomainEvent::RequestCreated(request("r", 10.0))).await.unwrap();
        assert_eq!(outcome, MatchOutcome::Duplicate(Admission::AlreadyResident));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let (service, _, _) = service();
        let err = service
            .handle(DomainEvent::OfferCreated(offer("o", -1.0, 4.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, MatchingError::Validation(_)));
        assert_eq!(depth(&service), BookDepth::default());
    }

    #[tokio::test]
    async fn test_matched_cleanup_is_idempotent() {
        let (service, _, mirror) = service();
        service.handle(DomainEvent::RequestCreated(request("r", 10.0))).await.unwrap();
        let booking = match service.handle(DomainEvent::OfferCreated(offer("o", 8.0, 4.9))).await.unwrap() {
            MatchOutcome::Matched(booking) => booking,
            other => panic!("expected a match, got {:?}", other),
        };
        let matched = Matched {
            booking_id: booking.id,
            request_id: booking.request_id,
            offer_id: booking.offer_id,
        };

        for _ in 0..2 {
            let outcome = service.handle(DomainEvent::Matched(matched.clone())).await.unwrap();
            assert_eq!(outcome, MatchOutcome::CleanedUp { evicted: 0 });
        }
        let key = MarketKey::new("PVG", "sedan");
        assert_eq!(mirror.len(&key, BookSide::Requests), 0);
        assert_eq!(mirror.len(&key, BookSide::Offers), 0);
    }

    #[tokio::test]
    async fn test_booking_completed_is_ignored() {
        let (service, _, _) = service();
        let event = DomainEvent::BookingCompleted(crate::shared::events::BookingCompleted {
            booking_id: crate::domain::ids::BookingId::new("b-9"),
        });
        assert_eq!(service.handle(event).await.unwrap(), MatchOutcome::Ignored);
    }
}
