//! Rate core error types.

use thiserror::Error;

/// Errors surfaced by the exchange rate core.
#[derive(Debug, Error)]
pub enum RateError {
    /// Request rejected before any collaborator was called.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider unreachable or returned undecodable data.
    #[error("Rate fetch failed: {0}")]
    FetchFailed(ProviderError),

    /// Store query failed.
    #[error("Rate store unavailable: {0}")]
    StoreUnavailable(StoreError),

    /// The observation batch was not committed.
    #[error("Failed to persist rates: {0}")]
    PersistFailed(StoreError),
}

impl RateError {
    /// Check if this error was caused by the caller.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RateError::InvalidInput(_))
    }
}

/// Result type for rate core operations.
pub type RateResult<T> = Result<T, RateError>;

/// Errors from a rate provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request could not be sent or the connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status.
    #[error("Provider returned status {0}")]
    Status(u16),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors from a rate store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Read query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Write batch failed and was rolled back.
    #[error("Write failed: {0}")]
    Write(String),
}

/// Errors from a cache backend. Never fatal to the core.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend unreachable or rejected the operation.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// No room for a new entry.
    #[error("Cache full ({0} entries)")]
    Full(usize),
}

/// Errors from a change notifier. Never fatal to the core.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Queue has no room for the event.
    #[error("Notification queue full")]
    QueueFull,

    /// Queue consumer has gone away.
    #[error("Notification queue closed")]
    Closed,

    /// Delivery failed.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}
