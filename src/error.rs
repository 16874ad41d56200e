use thiserror::Error;

/// Top-level error for the AfriCycle core ledger.
///
/// Variants are error *kinds*, not per-module classes: every module error
/// converts into exactly one kind. Any error aborts the enclosing operation
/// atomically; callers never observe partial state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AfriCycleError {
    /// Caller lacks the required role or ownership relation to the target.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Operation attempted against an entity not in the required state.
    #[error("State error: {0}")]
    State(String),

    /// Malformed or out-of-range input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Token movement cannot complete (buyer or ledger reserve is short).
    #[error("Resource error: {0}")]
    Resource(String),

    /// Referenced id or address does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AfriCycleError>;
