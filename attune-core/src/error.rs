//! Error types for attune-core

use thiserror::Error;

/// Top-level error type for attune-core
#[derive(Error, Debug)]
pub enum AttuneError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to session lifecycle and orchestration
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: cannot {operation} while {state}")]
    InvalidTransition { operation: String, state: String },

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Collaborator unavailable: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the engagement classifier
///
/// A malformed sample is discarded by the caller; the classifier never
/// substitutes a default score.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("sample from participant {participant_id} carries no usable feature")]
    MissingFeatures { participant_id: String },
}

/// Errors from external collaborators (durable store, question generator,
/// participant directory)
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("question generator failed: {0}")]
    GeneratorFailed(String),

    #[error("participant directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Errors from configuration validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
