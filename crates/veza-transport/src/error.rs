use thiserror::Error;

/// Centralized error type for transport operations.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("statistics unavailable: {0}")]
    Stats(String),
    #[error("failed to apply sender parameters: {0}")]
    Parameters(String),
    #[error("negotiation restart failed: {0}")]
    Negotiation(String),
    #[error("configuration rejected: {0}")]
    Configuration(String),
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn stats<S: Into<String>>(msg: S) -> Self {
        Self::Stats(msg.into())
    }

    pub fn parameters<S: Into<String>>(msg: S) -> Self {
        Self::Parameters(msg.into())
    }

    pub fn negotiation<S: Into<String>>(msg: S) -> Self {
        Self::Negotiation(msg.into())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
