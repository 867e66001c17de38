//! Compile result types.

use std::collections::BTreeMap;

use litquery_expr::{canonical_hash, Expr, ExprResult, Operator};
use serde::Serialize;

use crate::error::{CompileError, CompilerResult, ErrorKind};
use crate::issue::{Issue, ValidationReport};
use crate::snapshot::{EmitTarget, SnapshotRef};

/// One render rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    /// Field key of the atom.
    pub field: String,
    /// Operator of the atom.
    pub operator: Operator,
    /// Id of the rule that rendered it.
    pub rule_id: String,
    /// Whether the atom was negated.
    pub negated: bool,
    /// Whether the dialect's negation wrapper was applied.
    pub negation_wrapped: bool,
    /// Where the fragment went.
    pub emit: EmitTarget,
    /// Parameter name for parameter emits.
    pub param_key: Option<String>,
    /// The rendered fragment.
    pub fragment: String,
}

/// Ordered rule applications of one render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderTrace {
    /// Records in render order.
    pub records: Vec<TraceRecord>,
}

impl RenderTrace {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was rendered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of the applied rules, in order.
    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.rule_id.as_str())
    }
}

/// Output of one compile.
///
/// A result with error issues carries an empty query and parameter map; the
/// normalized tree, report and snapshot reference are always populated.
///
/// # Example
///
/// ```ignore
/// let result = compiler.compile(&request)?;
/// if result.is_ok() {
///     send(&result.query, &result.params);
/// }
/// let key = result.idempotency_key()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileResult {
    /// Rendered provider query.
    pub query: String,
    /// Request parameters produced by parameter-emitting rules.
    pub params: BTreeMap<String, String>,
    /// The normalized tree that was checked and rendered.
    pub normalized: Expr,
    /// All warnings and errors.
    pub report: ValidationReport,
    /// Snapshot the result was compiled against.
    pub snapshot: SnapshotRef,
    /// Rule applications, when tracing was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<RenderTrace>,
}

impl CompileResult {
    /// Returns true if no error issue was recorded.
    pub fn is_ok(&self) -> bool {
        !self.report.has_errors()
    }

    /// Error issues.
    pub fn errors(&self) -> &[Issue] {
        &self.report.errors
    }

    /// Warning issues.
    pub fn warnings(&self) -> &[Issue] {
        &self.report.warnings
    }

    /// Content hash of the normalized tree.
    pub fn idempotency_key(&self) -> ExprResult<String> {
        canonical_hash(&self.normalized)
    }

    /// Converts an error-bearing result into [`CompileError::Rejected`].
    pub fn into_result(self) -> CompilerResult<Self> {
        match self.report.first_error_kind() {
            None => Ok(self),
            Some(kind) => Err(CompileError::Rejected {
                kind,
                issues: self.report.errors,
            }),
        }
    }

    pub(crate) fn rejected(normalized: Expr, report: ValidationReport, snapshot: SnapshotRef) -> Self {
        Self {
            query: String::new(),
            params: BTreeMap::new(),
            normalized,
            report,
            snapshot,
            trace: None,
        }
    }

    /// Kind of the first error, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.report.first_error_kind()
    }
}
