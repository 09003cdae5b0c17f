//! Domain errors for the dialogue miner.

use thiserror::Error;

/// Domain-level errors that can occur while simulating or ingesting dialogues.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No category with that name.
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Rename target already in use.
    #[error("Category already exists: {0}")]
    CategoryExists(String),

    /// A service may belong to one category only.
    #[error("Service '{service}' already belongs to category '{category}'")]
    ServiceConflict {
        /// The contested service.
        service: String,
        /// Its current owner.
        category: String,
    },

    /// No inbox record with that id.
    #[error("Pending record not found: {0}")]
    RecordNotFound(String),

    /// Neither the taxonomy nor the built-in library has templates.
    #[error("No scenario templates available for domain '{0}'")]
    NoScenarioTemplates(String),

    /// The backing generator returned an error.
    #[error("Turn generator failed: {0}")]
    Generator(String),

    /// The per-turn deadline elapsed.
    #[error("Turn generator timed out after {0}s")]
    GeneratorTimeout(u64),

    /// A lifecycle move the state machine forbids.
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
        /// Why the move was refused.
        reason: String,
    },

    /// Bad input, such as an empty name.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Filesystem failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Storage(err.to_string())
    }
}
