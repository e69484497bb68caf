//! Domain error types.

use common::OrderId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Coarse classification of a failure, used by outer layers to pick a
/// client-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// A referenced aggregate or member is absent.
    NotFound,
    /// The input is well formed but a business rule forbids the action.
    RuleViolation,
}

/// Errors raised by aggregates and domain services.
///
/// Every variant is deterministic: the same state and input always yield
/// the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A numeric field lies outside its allowed inclusive range.
    #[error("value of {field} is out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A required field is empty, zero or nil.
    #[error("value is required: {0}")]
    ValueRequired(&'static str),

    /// The order is not in the status the requested transition needs.
    #[error("invalid transition: cannot {action} an order in {current} status")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// None of the courier's storage places can hold the order.
    #[error("no free storage place")]
    NoFreeStoragePlace,

    /// The storage place is occupied or too small.
    #[error("cannot store order: place is not empty or volume too large")]
    CannotStoreOrder,

    /// The courier does not hold the given order in any storage place.
    #[error("order {0} is not held by the courier")]
    OrderNotHeld(OrderId),

    /// Dispatch was asked to place an order that is no longer Created.
    #[error("order is already assigned")]
    OrderAlreadyAssigned,

    /// No courier has a storage place able to hold the order.
    #[error("suitable courier was not found")]
    SuitableCourierNotFound,

    /// A collection argument was empty.
    #[error("missing input: {0}")]
    MissingInput(&'static str),
}

impl DomainError {
    /// Returns the error's classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::OutOfRange { .. }
            | DomainError::ValueRequired(_)
            | DomainError::MissingInput(_) => ErrorKind::Validation,
            DomainError::OrderNotHeld(_) => ErrorKind::NotFound,
            DomainError::InvalidTransition { .. }
            | DomainError::NoFreeStoragePlace
            | DomainError::CannotStoreOrder
            | DomainError::OrderAlreadyAssigned
            | DomainError::SuitableCourierNotFound => ErrorKind::RuleViolation,
        }
    }
}

/// Result alias for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
