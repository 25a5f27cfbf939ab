use thiserror::Error;

use crate::state::TerminalReason;

/// Errors surfaced by the resilience controller.
///
/// Everything transient is handled internally; the only error a caller ever
/// sees is the terminal one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    #[error("connection unrecoverable: {0}")]
    Unrecoverable(TerminalReason),
}

pub type ResilienceResult<T> = Result<T, ResilienceError>;
