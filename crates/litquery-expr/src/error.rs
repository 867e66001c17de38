//! Error types for expression decoding and normalization.

use thiserror::Error;

/// Errors that can occur while decoding, encoding or normalizing expressions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// The expression is structurally invalid.
    #[error("malformed expression at {path}: {message}")]
    Malformed {
        /// Location of the offending node (`$` is the root).
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// A range bound could not be parsed for its declared kind.
    #[error("invalid {kind} bound: '{input}'")]
    InvalidBound {
        /// Declared range kind name.
        kind: String,
        /// The rejected input.
        input: String,
    },

    /// The serializer failed to produce text.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ExprError {
    /// Creates a malformed-expression error at the given path.
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error reports structurally invalid input.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::InvalidBound { .. })
    }
}

/// Result type for expression operations.
pub type ExprResult<T> = std::result::Result<T, ExprError>;
