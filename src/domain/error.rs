//! Domain-level errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A guarded status transition was attempted from the wrong source state.
    /// The entity is left untouched.
    #[error("{entity} {id}: cannot move from '{from}' to '{to}'")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        from: &'static str,
        to: &'static str,
    },
}

/// Failure to take a matched pair out of a market book
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("{0} is no longer resident in the book")]
    NotResident(String),

    #[error(transparent)]
    Transition(#[from] DomainError),
}
