//! Application error types.

use common::CourierId;
use domain::DomainError;
use outbox::OutboxError;
use persistence::PersistenceError;
use thiserror::Error;

/// Classification used by adapters to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    RuleViolation,
    Infrastructure,
}

/// Errors raised by the geocoding port.
#[derive(Debug, Clone, Error)]
pub enum GeoError {
    #[error("Geo lookup timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unknown street: {0}")]
    UnknownStreet(String),

    #[error("Geo service unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while publishing to the message bus.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The caller's cancellation token fired first.
    #[error("Publish cancelled")]
    Cancelled,

    #[error("Bus error: {0}")]
    Bus(String),
}

/// Errors that can occur in use cases, the relay and jobs.
#[derive(Debug, Error)]
pub enum AppError {
    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Persistence error.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Outbox error.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Geo error: {0}")]
    Geo(#[from] GeoError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// No order is waiting for a courier.
    #[error("No orders available for assignment")]
    NotAvailableOrders,

    /// No courier is free.
    #[error("No couriers available for assignment")]
    NotAvailableCouriers,

    /// An assigned order references a courier that does not exist.
    #[error("Courier not found: {0}")]
    CourierNotFound(CourierId),

    /// A value cannot be mapped to the integration schema.
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Domain(e) => match e.kind() {
                domain::ErrorKind::Validation => ErrorKind::Validation,
                domain::ErrorKind::NotFound => ErrorKind::NotFound,
                domain::ErrorKind::RuleViolation => ErrorKind::RuleViolation,
            },
            AppError::Geo(GeoError::UnknownStreet(_)) => ErrorKind::Validation,
            AppError::InvalidValue { .. } => ErrorKind::Validation,
            AppError::CourierNotFound(_) => ErrorKind::NotFound,
            AppError::NotAvailableOrders | AppError::NotAvailableCouriers => {
                ErrorKind::RuleViolation
            }
            AppError::Persistence(
                PersistenceError::DuplicateKey { .. }
                | PersistenceError::Outbox(OutboxError::DuplicateMessage(_)),
            ) => ErrorKind::RuleViolation,
            AppError::Persistence(PersistenceError::NotFound { .. }) => ErrorKind::NotFound,
            AppError::Persistence(_)
            | AppError::Outbox(_)
            | AppError::Serialization(_)
            | AppError::Geo(_)
            | AppError::Publish(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Convenience type alias for application results.
pub type Result<T> = std::result::Result<T, AppError>;
