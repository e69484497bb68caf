use outbox::OutboxError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in repositories and units of work.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing outbox rows failed.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// A stored row does not satisfy the aggregate's invariants.
    #[error("Corrupt {aggregate} record {id}: {reason}")]
    CorruptRecord {
        aggregate: &'static str,
        id: Uuid,
        reason: String,
    },

    /// An aggregate with the same id already exists.
    #[error("{aggregate} {id} already exists")]
    DuplicateKey { aggregate: &'static str, id: Uuid },

    /// An update targeted an aggregate that was never added.
    #[error("{aggregate} {id} not found")]
    NotFound { aggregate: &'static str, id: Uuid },

    /// Commit or rollback was called without an open transaction.
    #[error("No transaction in progress")]
    NoTransaction,

    /// Begin was called while a transaction is already open.
    #[error("Transaction already started")]
    TransactionAlreadyStarted,

    /// The store refused the commit (injected in tests).
    #[error("Commit failed: {0}")]
    CommitFailed(&'static str),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
