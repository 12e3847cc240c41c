/// Application Layer - Use Cases and Services
///
/// Orchestrates the domain layer against the outside world. It depends on
/// the domain layer and talks to infrastructure only through the traits in
/// `ports` (dependency injection).
///
/// ## Modules
/// - `ports`: repository, publisher, event source and mirror traits
/// - `services`: matching orchestrator, book registry, partitioned dispatcher
/// - `use_cases`: order creation and booking completion
/// - `error`: application error types

pub mod error;
pub mod ports;
pub mod services;
pub mod use_cases;

pub use error::{MatchingError, MirrorError, PublishError, RepositoryError, UseCaseError};
pub use services::{BookRegistry, MatchOutcome, MatchingService, PartitionConfig, PartitionedDispatcher, PublishRetry};
pub use use_cases::{CompleteBookingUseCase, CreateOrderUseCase};
