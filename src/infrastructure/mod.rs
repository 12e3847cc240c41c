/// Infrastructure Layer - Adapters
///
/// In-process implementations of the application ports, plus the
/// observability HTTP server. The application layer only sees the traits.
///
/// ## Modules
/// - `persistence`: order repository with an atomic multi-entity write
/// - `eventbus`: fan-out publish/subscribe with delivery acknowledgement
/// - `mirror`: sorted-set view of the books
/// - `observability`: metrics, health and depth endpoints

pub mod eventbus;
pub mod mirror;
pub mod observability;
pub mod persistence;

pub use eventbus::{InMemoryEventBus, Subscription};
pub use mirror::{InMemorySortedSetMirror, NoopMirror};
pub use observability::ObservabilityServer;
pub use persistence::InMemoryOrderRepository;
