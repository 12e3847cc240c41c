//! In-memory event bus
//!
//! Fan-out publish/subscribe over unbounded tokio channels. Every subscriber
//! receives every event published after it subscribed. The bus counts
//! deliveries that are queued or being handled; [`InMemoryEventBus::wait_idle`]
//! resolves once that count drops to zero, which is how the replay driver
//! knows the cascade of `Matched` events has settled. The most recent
//! publishes are kept for inspection, up to a fixed history size.

use crate::application::error::PublishError;
use crate::application::ports::{Acknowledger, Delivery, EventPublisher, EventSource};
use crate::shared::events::DomainEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::trace;

/// Outstanding-delivery counter shared by the bus and its subscriptions
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn acquire(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Publishes kept by [`InMemoryEventBus::new`]
pub const DEFAULT_HISTORY: usize = 1024;

#[derive(Debug)]
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<DomainEvent>>>,
    history: usize,
    published: Mutex<VecDeque<DomainEvent>>,
    in_flight: Arc<InFlight>,
    closed: AtomicBool,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the last `history` publishes; `0` keeps none
    pub fn with_history(history: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            history,
            published: Mutex::new(VecDeque::with_capacity(history.min(DEFAULT_HISTORY))),
            in_flight: Arc::new(InFlight::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Subscription {
            rx,
            in_flight: self.in_flight.clone(),
        }
    }

    /// Retained publishes, oldest first
    pub fn published(&self) -> Vec<DomainEvent> {
        self.published.lock().iter().cloned().collect()
    }

    /// Deliveries queued or being handled
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Resolves once every delivery has been acknowledged
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Refuses further publishes and ends every subscription once drained
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.subscribers.lock().clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        trace!(kind = event.kind(), key = %event.routing_key(), "publish");

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| {
            self.in_flight.acquire();
            if tx.send(event.clone()).is_ok() {
                true
            } else {
                self.in_flight.release();
                false
            }
        });
        drop(subscribers);

        if self.history > 0 {
            let mut published = self.published.lock();
            if published.len() == self.history {
                published.pop_front();
            }
            published.push_back(event);
        }
        Ok(())
    }
}

/// Receiving end of one subscriber
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<DomainEvent>,
    in_flight: Arc<InFlight>,
}

#[async_trait]
impl EventSource for Subscription {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        let event = self.rx.recv().await?;
        let in_flight = self.in_flight.clone();
        Some(Delivery::new(event, Acknowledger::new(move || in_flight.release())))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {
            self.in_flight.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::BookingId;
    use crate::shared::events::BookingCompleted;
    use std::time::Duration;

    fn event(id: &str) -> DomainEvent {
        DomainEvent::BookingCompleted(BookingCompleted {
            booking_id: BookingId::new(id),
        })
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = InMemoryEventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(event("b-1")).await.unwrap();
        assert_eq!(bus.in_flight(), 2);

        let da = a.next_delivery().await.unwrap();
        let db = b.next_delivery().await.unwrap();
        assert_eq!(da.event, event("b-1"));
        assert_eq!(db.event, event("b-1"));

        drop(da);
        drop(db);
        assert_eq!(bus.in_flight(), 0);
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_ack() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe();
        bus.publish(event("b-1")).await.unwrap();

        let delivery = sub.next_delivery().await.unwrap();
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        delivery.ack.ack();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_idle resolves after ack")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_subscription_releases_pending() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe();
        bus.publish(event("b-1")).await.unwrap();
        bus.publish(event("b-2")).await.unwrap();
        assert_eq!(bus.in_flight(), 2);

        drop(sub);
        assert_eq!(bus.in_flight(), 0);

        // the dead subscriber is pruned on the next publish
        bus.publish(event("b-3")).await.unwrap();
        assert_eq!(bus.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let bus = InMemoryEventBus::with_history(2);
        for id in ["b-1", "b-2", "b-3"] {
            bus.publish(event(id)).await.unwrap();
        }
        assert_eq!(bus.published(), vec![event("b-2"), event("b-3")]);

        let silent = InMemoryEventBus::with_history(0);
        let mut sub = silent.subscribe();
        silent.publish(event("b-1")).await.unwrap();
        assert!(silent.published().is_empty());
        assert_eq!(sub.next_delivery().await.unwrap().event, event("b-1"));
    }

    #[tokio::test]
    async fn test_close() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe();
        bus.close();
        assert_eq!(bus.publish(event("b-1")).await, Err(PublishError::Closed));
        assert!(sub.next_delivery().await.is_none());
    }
}
