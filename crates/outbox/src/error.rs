use common::EventId;
use thiserror::Error;

/// Errors that can occur when reading or writing outbox messages.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No decoder is registered for the stored type tag.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// A row with this id is already stored.
    #[error("Duplicate outbox message: {0}")]
    DuplicateMessage(EventId),

    /// The store refused the operation (injected in tests).
    #[error("Outbox unavailable: {0}")]
    Unavailable(&'static str),
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
