//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// state machines, quantity checks). Infrastructure concerns are limited to
/// [`DomainError::TransientStore`], the only retryable variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A malformed task tree or parent chain. Fatal, never retried.
    #[error("structural error: {0}")]
    Structural(String),

    /// A consuming operation asked for more than the stock can supply.
    ///
    /// Expected business condition; the caller re-presents with an adjusted
    /// request, never auto-retries.
    #[error("insufficient quantity: requested {requested}, available {available}")]
    InsufficientQuantity { requested: i64, available: i64 },

    /// An action was attempted from a state outside its allowed set.
    ///
    /// The caller must re-fetch current state before retrying.
    #[error("invalid state transition: {entity} cannot {action} from {from}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        action: String,
    },

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. a slot that can be bound only once).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A store-level failure (lock poisoning, timeout) with no partial
    /// writes. Safe to retry the whole transaction a bounded number of times.
    #[error("transient store failure: {0}")]
    TransientStore(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    pub fn insufficient_quantity(requested: i64, available: i64) -> Self {
        Self::InsufficientQuantity {
            requested,
            available,
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            from: from.into(),
            action: action.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientStore(msg.into())
    }

    /// Whether retrying the whole transaction can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }
}
