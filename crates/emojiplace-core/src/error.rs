//! Errors a placement surfaces to its caller.
//!
//! Only these three reach the placer. Cache, lease, delivery and reasoning
//! failures are absorbed and logged by the component that hit them.

use std::time::Duration;
use thiserror::Error;

/// Result type for placement operations.
pub type PlaceResult<T> = Result<T, PlaceError>;

/// Errors returned by the placement pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceError {
    /// Malformed coordinate, mark or display name. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The identity placed too recently.
    #[error("Cooldown active: {}s remaining", remaining_secs(.remaining))]
    CooldownActive { remaining: Duration },

    /// The durable store could not be read or written. Try again.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl PlaceError {
    /// Machine-readable reason sent to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            PlaceError::Validation(_) => "validation",
            PlaceError::CooldownActive { .. } => "cooldown",
            PlaceError::StoreUnavailable(_) => "unavailable",
        }
    }

    /// Remaining cooldown, if this is a cooldown rejection.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            PlaceError::CooldownActive { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

/// Whole seconds left, rounded up so a client never retries early.
pub fn remaining_secs(remaining: &Duration) -> u64 {
    let millis = remaining.as_millis() as u64;
    millis.div_ceil(1000)
}
