//! Handler-set error handling

use thiserror::Error;

use crate::storage::StorageError;

/// Errors produced while matching a revision or materializing an instance
#[derive(Error, Debug)]
pub enum ClassError {
    /// Every rule of the handler-set rejected the revision
    #[error("No handler in '{class}' matched the revision")]
    NoMatchingHandler { class: String },

    /// No handler-set with this name is registered
    #[error("No handler-set named '{name}'")]
    UnknownClass { name: String },

    /// A configured rule has nothing to run
    #[error("Handler-set '{class}' has a rule with an empty command")]
    EmptyCommand { class: String },

    /// The transformation command could not produce its artifact
    #[error("Transformation {command:?} failed: {detail}")]
    Execution { command: Vec<String>, detail: String },

    /// An instance could not be serialized
    #[error("Failed to encode instance: {0}")]
    Encode(#[from] serde_json::Error),

    /// An opened instance stream failed mid-read
    #[error("Failed to read instance: {0}")]
    Stream(#[from] std::io::Error),

    /// Reading the source revision or the cache failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClassError {
    pub(crate) fn execution(command: &[String], detail: impl Into<String>) -> Self {
        ClassError::Execution {
            command: command.to_vec(),
            detail: detail.into(),
        }
    }

    /// Whether the revision simply is not handled (as opposed to a failure)
    pub fn is_no_match(&self) -> bool {
        matches!(self, ClassError::NoMatchingHandler { .. })
    }
}

/// Result type for handler-set operations
pub type ClassResult<T> = Result<T, ClassError>;
