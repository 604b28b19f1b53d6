//! Error types for mcmc-chains
//!
//! Dependency-not-ready and claimed-elsewhere are scheduling outcomes, not
//! errors. Everything in here terminates the worker loop that hit it.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// mcmc-chains error types
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown category, unknown model name, or a forbidden operation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A task references a parameter set that was never registered
    #[error("Input not found: no parameter set with hash {hash}")]
    InputNotFound {
        /// Content hash of the missing parameter set
        hash: String,
    },

    /// A result references a model snapshot that is not in the store
    #[error("Model snapshot not found: {hash}")]
    ModelNotFound {
        /// Content hash of the missing snapshot
        hash: String,
    },

    /// A stored record failed to parse
    #[error("Corrupt record {category}/{name}: {reason}")]
    CorruptRecord {
        /// Category the record lives in
        category: String,
        /// File name of the record
        name: String,
        /// Parser message
        reason: String,
    },

    /// The spin model collaborator failed
    #[error("Model error: {0}")]
    Model(#[from] anyhow::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::CorruptRecord`] from a category, file name and cause.
    pub fn corrupt(
        category: impl Into<String>,
        name: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::CorruptRecord {
            category: category.into(),
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
