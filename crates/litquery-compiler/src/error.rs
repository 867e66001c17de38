//! Error types for compilation.

use std::fmt;
use std::time::Duration;

use litquery_expr::ExprError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::issue::Issue;
use crate::traits::{SnapshotKey, SourceError};

/// Coarse classification of everything that can stop a compile.
///
/// Both [`CompileError`] and error-severity [`Issue`]s map onto one of these,
/// so callers can decide per kind whether to retry, fall back or escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Structurally invalid expression. A caller bug.
    MalformedExpression,
    /// The expression uses something the provider does not accept.
    CapabilityViolation,
    /// A legal atom has no render rule. A registry configuration gap.
    RenderRuleMissing,
    /// The rendered query is longer than allowed.
    OutputBudgetExceeded,
    /// The snapshot could not be loaded.
    DependencyUnavailable,
    /// A compile option is invalid.
    InvalidConfig,
}

impl ErrorKind {
    /// Returns the stable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedExpression => "MALFORMED_EXPRESSION",
            ErrorKind::CapabilityViolation => "CAPABILITY_VIOLATION",
            ErrorKind::RenderRuleMissing => "RENDER_RULE_MISSING",
            ErrorKind::OutputBudgetExceeded => "OUTPUT_BUDGET_EXCEEDED",
            ErrorKind::DependencyUnavailable => "DEPENDENCY_UNAVAILABLE",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the compiler.
///
/// Capability, render and budget problems are normally reported as
/// [`Issue`]s inside a [`CompileResult`](crate::CompileResult); they only
/// become a `CompileError` through
/// [`CompileResult::into_result`](crate::CompileResult::into_result).
#[derive(Error, Debug)]
pub enum CompileError {
    /// The expression failed decoding or normalization.
    #[error("malformed expression: {0}")]
    Malformed(#[from] ExprError),

    /// A compile option is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The snapshot source failed.
    #[error("snapshot {key} unavailable: {source}")]
    DependencyUnavailable {
        /// The requested snapshot.
        key: SnapshotKey,
        /// The underlying failure.
        #[source]
        source: SourceError,
    },

    /// The snapshot arrived after the configured deadline.
    #[error("snapshot {key} not loaded within {deadline:?}")]
    DeadlineExceeded {
        /// The requested snapshot.
        key: SnapshotKey,
        /// The configured deadline.
        deadline: Duration,
    },

    /// The compile finished with error issues.
    #[error("{kind}: compilation rejected with {} error issue(s)", .issues.len())]
    Rejected {
        /// Kind of the first error issue.
        kind: ErrorKind,
        /// All error issues.
        issues: Vec<Issue>,
    },
}

impl CompileError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Malformed(_) => ErrorKind::MalformedExpression,
            CompileError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            CompileError::DependencyUnavailable { .. } | CompileError::DeadlineExceeded { .. } => {
                ErrorKind::DependencyUnavailable
            }
            CompileError::Rejected { kind, .. } => *kind,
        }
    }
}

/// Result type for compiler operations.
pub type CompilerResult<T> = std::result::Result<T, CompileError>;
