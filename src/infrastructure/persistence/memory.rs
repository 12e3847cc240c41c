//! In-memory order repository
//!
//! Holds requests, offers and bookings in hash maps behind one
//! `parking_lot::RwLock`. `save_all` takes the write lock once, so the three
//! entities become visible together.

use crate::application::error::RepositoryError;
use crate::application::ports::OrderRepository;
use crate::domain::entities::{Booking, DriverOffer, PickupRequest};
use crate::domain::ids::{BookingId, DriverId, OfferId, PassengerId, RequestId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Store {
    requests: HashMap<RequestId, PickupRequest>,
    offers: HashMap<OfferId, DriverOffer>,
    bookings: HashMap<BookingId, Booking>,
}

#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    store: RwLock<Store>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn booking_count(&self) -> usize {
        self.store.read().bookings.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save_request(&self, request: &PickupRequest) -> Result<(), RepositoryError> {
        self.store.write().requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn save_offer(&self, offer: &DriverOffer) -> Result<(), RepositoryError> {
        self.store.write().offers.insert(offer.id.clone(), offer.clone());
        Ok(())
    }

    async fn find_request(&self, id: &RequestId) -> Result<Option<PickupRequest>, RepositoryError> {
        Ok(self.store.read().requests.get(id).cloned())
    }

    async fn find_offer(&self, id: &OfferId) -> Result<Option<DriverOffer>, RepositoryError> {
        Ok(self.store.read().offers.get(id).cloned())
    }

    async fn find_booking(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.store.read().bookings.get(id).cloned())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, RepositoryError> {
        let mut bookings: Vec<Booking> = self.store.read().bookings.values().cloned().collect();
        bookings.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(bookings)
    }

    async fn has_ongoing_request(&self, passenger_id: &PassengerId) -> Result<bool, RepositoryError> {
        Ok(self
            .store
            .read()
            .requests
            .values()
            .any(|r| &r.passenger_id == passenger_id && r.status().is_ongoing()))
    }

    async fn has_ongoing_offer(&self, driver_id: &DriverId) -> Result<bool, RepositoryError> {
        Ok(self
            .store
            .read()
            .offers
            .values()
            .any(|o| &o.driver_id == driver_id && o.status().is_ongoing()))
    }

    async fn save_all(
        &self,
        booking: &Booking,
        request: &PickupRequest,
        offer: &DriverOffer,
    ) -> Result<(), RepositoryError> {
        if booking.request_id != request.id || booking.offer_id != offer.id {
            return Err(RepositoryError::Conflict(format!(
                "booking {} does not reference request {} and offer {}",
                booking.id, request.id, offer.id
            )));
        }
        let mut store = self.store.write();
        store.bookings.insert(booking.id.clone(), booking.clone());
        store.requests.insert(request.id.clone(), request.clone());
        store.offers.insert(offer.id.clone(), offer.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::OrderStatus;
    use crate::domain::ids::SequenceGenerator;
    use crate::domain::matching::build_booking;
    use crate::domain::values::{AvailabilityWindow, Price};
    use chrono::{TimeZone, Utc};

    fn request() -> PickupRequest {
        PickupRequest::new(
            RequestId::new("r-1"),
            PassengerId::new("p-1"),
            "PVG",
            "sedan",
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            Price::from_cents(1000),
            false,
        )
    }

    fn offer() -> DriverOffer {
        DriverOffer::new(
            OfferId::new("o-1"),
            DriverId::new("d-1"),
            "PVG",
            "sedan",
            AvailabilityWindow::new(
                Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ),
            Price::from_cents(800),
            4.5,
        )
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = InMemoryOrderRepository::new();
        repo.save_request(&request()).await.unwrap();
        repo.save_offer(&offer()).await.unwrap();

        assert!(repo.find_request(&RequestId::new("r-1")).await.unwrap().is_some());
        assert!(repo.find_offer(&OfferId::new("o-1")).await.unwrap().is_some());
        assert!(repo.find_request(&RequestId::new("r-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ongoing_checks() {
        let repo = InMemoryOrderRepository::new();
        assert!(!repo.has_ongoing_request(&PassengerId::new("p-1")).await.unwrap());

        repo.save_request(&request()).await.unwrap();
        assert!(repo.has_ongoing_request(&PassengerId::new("p-1")).await.unwrap());
        assert!(!repo.has_ongoing_offer(&DriverId::new("d-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_all_writes_three_entities() {
        let repo = InMemoryOrderRepository::new();
        let (mut r, mut o) = (request(), offer());
        r.mark_matched().unwrap();
        o.mark_matched().unwrap();
        let booking = build_booking(&r, &o, &SequenceGenerator::new("b"));

        repo.save_all(&booking, &r, &o).await.unwrap();
        assert_eq!(repo.booking_count(), 1);
        assert_eq!(
            repo.find_request(&r.id).await.unwrap().unwrap().status(),
            OrderStatus::Matched
        );
        assert_eq!(repo.list_bookings().await.unwrap(), vec![booking]);
    }

    #[tokio::test]
    async fn test_save_all_rejects_mismatched_pair() {
        let repo = InMemoryOrderRepository::new();
        let r = request();
        let o = offer();
        let mut other = offer();
        other.id = OfferId::new("o-2");
        let booking = build_booking(&r, &other, &SequenceGenerator::new("b"));

        let err = repo.save_all(&booking, &r, &o).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.booking_count(), 0);
        assert!(repo.find_request(&r.id).await.unwrap().is_none());
    }
}
