/// Partitioned Dispatcher - parallel event handling
///
/// Reads deliveries from an [`EventSource`] and routes each one to a worker
/// task chosen by hashing the event's routing key, so that:
/// - every event of one market is handled by the same worker, in delivery order
/// - independent markets proceed in parallel across workers
///
/// Per-market locks in the orchestrator remain the correctness guarantee; the
/// partitioning only removes needless contention.
///
/// ## Architecture
/// - **Router**: one task pulling from the source, `DefaultHasher` on the key
/// - **Partitions**: bounded tokio mpsc queues; a full queue back-pressures
///   the router
/// - **Workers**: one task per partition calling [`MatchingService::handle`];
///   the delivery is acknowledged once handling returns
///
/// ## Usage
/// ```rust,ignore
/// let dispatcher = PartitionedDispatcher::new(Arc::new(service), PartitionConfig::default());
/// let handle = dispatcher.spawn(bus.subscribe());
/// bus.wait_idle().await;
/// handle.shutdown().await;
/// ```

use super::matching_service::{MatchOutcome, MatchingService};
use crate::application::error::MatchingError;
use crate::application::ports::{BookMirror, Delivery, EventPublisher, EventSource, OrderRepository};
use futures::future::join_all;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Configuration for the dispatcher
#[derive(Clone, Debug)]
pub struct PartitionConfig {
    /// Number of worker partitions (recommended: number of CPU cores)
    pub partition_count: usize,

    /// Queue capacity per partition
    pub queue_capacity: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            partition_count: num_cpus::get(),
            queue_capacity: 1024,
        }
    }
}

/// Counters of one partition
#[derive(Debug, Default)]
struct PartitionCounters {
    events: AtomicU64,
    matches: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of one partition's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub events_processed: u64,
    pub matches: u64,
    pub failures: u64,
}

pub struct PartitionedDispatcher<R, P, M> {
    service: Arc<MatchingService<R, P, M>>,
    config: PartitionConfig,
}

impl<R, P, M> PartitionedDispatcher<R, P, M>
where
    R: OrderRepository + 'static,
    P: EventPublisher + 'static,
    M: BookMirror + 'static,
{
    pub fn new(service: Arc<MatchingService<R, P, M>>, config: PartitionConfig) -> Self {
        let config = PartitionConfig {
            partition_count: config.partition_count.max(1),
            queue_capacity: config.queue_capacity.max(1),
        };
        Self { service, config }
    }

    pub fn partition_count(&self) -> usize {
        self.config.partition_count
    }

    /// Starts the router and one worker per partition
    pub fn spawn<S>(self, mut source: S) -> DispatcherHandle
    where
        S: EventSource + 'static,
    {
        let partition_count = self.config.partition_count;
        let mut senders = Vec::with_capacity(partition_count);
        let mut workers = Vec::with_capacity(partition_count);
        let mut counters = Vec::with_capacity(partition_count);

        for partition_id in 0..partition_count {
            let (tx, rx) = mpsc::channel(self.config.queue_capacity);
            let stats = Arc::new(PartitionCounters::default());
            senders.push(tx);
            counters.push(stats.clone());
            workers.push(tokio::spawn(run_worker(
                partition_id,
                self.service.clone(),
                rx,
                stats,
            )));
        }

        let router = tokio::spawn(async move {
            while let Some(delivery) = source.next_delivery().await {
                let partition_id = route_to_partition(&delivery.event.routing_key(), partition_count);
                if senders[partition_id].send(delivery).await.is_err() {
                    error!(partition_id, "partition worker gone, stopping router");
                    break;
                }
            }
            debug!("event source closed, router exiting");
        });

        info!(partitions = partition_count, "dispatcher started");
        DispatcherHandle {
            router,
            workers,
            counters,
        }
    }
}

async fn run_worker<R, P, M>(
    partition_id: usize,
    service: Arc<MatchingService<R, P, M>>,
    mut rx: mpsc::Receiver<Delivery>,
    stats: Arc<PartitionCounters>,
) where
    R: OrderRepository,
    P: EventPublisher,
    M: BookMirror,
{
    while let Some(Delivery { event, ack }) = rx.recv().await {
        let kind = event.kind();
        stats.events.fetch_add(1, Ordering::Relaxed);
        match service.handle(event).await {
            Ok(MatchOutcome::Matched(booking)) => {
                stats.matches.fetch_add(1, Ordering::Relaxed);
                debug!(partition_id, booking_id = %booking.id, "booking committed");
            }
            Ok(outcome) => debug!(partition_id, kind, ?outcome, "event handled"),
            Err(MatchingError::Validation(e)) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!(partition_id, kind, error = %e, "event dropped");
            }
            Err(e) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                error!(partition_id, kind, error = %e, "event handling failed");
            }
        }
        ack.ack();
    }
    debug!(partition_id, "partition worker exiting");
}

/// Routes a key to a partition; the same key always lands on the same one
#[inline]
fn route_to_partition(key: &str, partition_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % partition_count
}

/// Running dispatcher
pub struct DispatcherHandle {
    router: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    counters: Vec<Arc<PartitionCounters>>,
}

impl DispatcherHandle {
    pub fn stats(&self) -> Vec<PartitionStats> {
        self.counters
            .iter()
            .map(|c| PartitionStats {
                events_processed: c.events.load(Ordering::Relaxed),
                matches: c.matches.load(Ordering::Relaxed),
                failures: c.failures.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Waits until the source closes and every queued delivery is handled
    pub async fn join(self) {
        if let Err(e) = self.router.await {
            error!(error = %e, "router task failed");
        }
        join_workers(self.workers).await;
    }

    /// Stops pulling new deliveries; already queued ones are still handled
    pub async fn shutdown(self) {
        self.router.abort();
        if let Err(e) = self.router.await {
            if !e.is_cancelled() {
                error!(error = %e, "router task failed");
            }
        }
        join_workers(self.workers).await;
        info!("dispatcher stopped");
    }
}

async fn join_workers(workers: Vec<JoinHandle<()>>) {
    for result in join_all(workers).await {
        if let Err(e) = result {
            error!(error = %e, "partition worker failed");
        }
    }
}
