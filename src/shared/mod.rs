/// Shared types used across all layers
///
/// - `events`: the domain event enum carried by the event transport
/// - `health`: collaborator health reported by the orchestrator
/// - `metrics`: the global Prometheus registry

pub mod events;
pub mod health;
pub mod metrics;

pub use events::{BookingCompleted, DomainEvent, Matched, OfferCreated, RequestCreated};
pub use health::{HealthChecker, HealthDetails, HealthResponse, HealthStatus};
pub use metrics::METRICS;
