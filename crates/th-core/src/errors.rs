//! Error taxonomy (§7).
//!
//! `EngineError` is intentionally absent here: per §4.3/§7 it is a value
//! returned by engines (`th_types::EngineResult::Error`), never an
//! exception type, so it has no place in a `thiserror` enum.

use thiserror::Error;

/// Caller supplied bad input. Surfaced immediately, never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("text must not be empty")]
    EmptyText,
    #[error("target_langs must not be empty")]
    EmptyTargetLangs,
    #[error("invalid lang code: {0}")]
    InvalidLangCode(String),
    #[error("unknown engine: {0}")]
    UnknownEngine(String),
    #[error("business_id conflict for {0}")]
    BusinessIdConflict(String),
}

/// Missing/invalid configuration for the active engine or storage backend.
/// Fatal at `initialize`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("missing required config key: {0}")]
    MissingKey(String),
    #[error("invalid config value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("engine '{0}' is not registered")]
    EngineNotRegistered(String),
}

/// Persistence failure. `transient()` distinguishes failures the caller
/// should retry once inline from ones that must surface (§7).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("row not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient io error: {0}")]
    TransientIo(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown storage error: {0}")]
    Unknown(String),
}

impl StorageError {
    /// Whether a single inline retry (not the policy's retry loop — a
    /// lower-level one, e.g. reconnect) is appropriate.
    pub fn transient(&self) -> bool {
        matches!(self, StorageError::SerializationConflict | StorageError::TransientIo(_) | StorageError::Unavailable(_))
    }
}

/// Top-level error returned by the Coordinator's public API, aggregating
/// the others.
#[derive(Debug, Error)]
pub enum TransHubError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("internal: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_transience_classification() {
        assert!(StorageError::SerializationConflict.transient());
        assert!(!StorageError::NotFound.transient());
        assert!(!StorageError::UniqueViolation("x".into()).transient());
    }

    #[test]
    fn trans_hub_error_wraps_validation() {
        let e: TransHubError = ValidationError::EmptyText.into();
        assert_eq!(e.to_string(), "text must not be empty");
    }
}
