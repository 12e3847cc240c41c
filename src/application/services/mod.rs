/// Application Services
///
/// - `book_registry`: per-market books, one lock per market key
/// - `matching_service`: the event-handling orchestrator
/// - `partitioned_service`: routes deliveries to parallel workers by key

pub mod book_registry;
pub mod matching_service;
pub mod partitioned_service;

pub use book_registry::{BookRegistry, MarketDepth, SharedBook};
pub use matching_service::{MatchOutcome, MatchingService, PublishRetry};
pub use partitioned_service::{DispatcherHandle, PartitionConfig, PartitionStats, PartitionedDispatcher};
