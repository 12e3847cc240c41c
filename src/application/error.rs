//! Application-layer error taxonomy
//!
//! Only [`MatchingError::Persistence`] aborts an event after the book was
//! touched, and it is returned only once the tentative claim has been rolled
//! back. [`MatchingError::Publish`] is reported after the retries ran out and
//! the inline cleanup ran. Lost races surface as an outcome, not an error.
//! Mirror failures never leave the orchestrator.

use crate::domain::error::DomainError;
use crate::domain::validation::ValidationError;
use thiserror::Error;

/// Failure of the durable store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write conflict: {0}")]
    Conflict(String),
}

/// Failure of the event transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("event bus closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure of the best-effort remote mirror
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("mirror unavailable: {0}")]
    Unavailable(String),

    #[error("cannot serialize entity: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

/// Errors returned by the matching orchestrator
#[derive(Debug, Error)]
pub enum MatchingError {
    /// Malformed inbound payload; the event is dropped
    #[error("invalid event payload: {0}")]
    Validation(#[from] ValidationError),

    /// The atomic booking write failed; the claim was rolled back
    #[error("booking not persisted: {0}")]
    Persistence(#[source] RepositoryError),

    /// The booking is durable but `Matched` could not be handed to the bus
    #[error("match event not published: {0}")]
    Publish(#[source] PublishError),

    /// A point lookup during cleanup failed
    #[error("lookup failed: {0}")]
    Repository(#[source] RepositoryError),
}

/// Errors returned by the creation and completion use cases
#[derive(Debug, Error)]
pub enum UseCaseError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidState(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already has an ongoing order")]
    AlreadyOngoing(String),
}
