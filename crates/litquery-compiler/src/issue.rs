//! Diagnostics produced while checking and rendering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Severity of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Reported but does not stop compilation.
    Warning,
    /// Stops compilation; the query is not emitted.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// Stable machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    // Capability checks
    /// No active capability declaration for the field.
    FieldNotSupported,
    /// The operator is not in the declared set.
    OperatorNotAllowed,
    /// The atom is negated but its operator is not negatable.
    NegationNotAllowed,
    /// TERM match type not allowed.
    MatchTypeNotAllowed,
    /// Case-sensitive matching requested but not allowed.
    CaseSensitivityNotAllowed,
    /// Blank TERM text not allowed.
    BlankTerm,
    /// TERM text shorter than the declared minimum.
    TermTooShort,
    /// TERM text longer than the declared maximum.
    TermTooLong,
    /// TERM text does not match the declared pattern.
    TermPatternMismatch,
    /// IN list has no values.
    InListEmpty,
    /// IN list has more distinct values than allowed.
    InListTooLarge,
    /// IN list repeats a value.
    InDuplicateValues,
    /// RANGE kind differs from the declared kind.
    RangeKindMismatch,
    /// Open RANGE start not allowed.
    RangeOpenStartNotAllowed,
    /// Open RANGE end not allowed.
    RangeOpenEndNotAllowed,
    /// A RANGE bound lies below the declared minimum.
    RangeBelowMin,
    /// A RANGE bound lies above the declared maximum.
    RangeAboveMax,
    /// RANGE lower bound exceeds its upper bound.
    RangeInverted,
    /// EXISTS not supported for the field.
    ExistsNotSupported,
    /// TOKEN kind not allowed.
    TokenKindNotAllowed,
    /// TOKEN value does not match the declared pattern.
    TokenPatternMismatch,

    // Rendering
    /// No render rule matches the atom.
    RenderRuleMissing,
    /// Negation needed but the dialect has no negation wrapper.
    NegationUnsupported,
    /// `false` must be rendered but the dialect has no match-nothing marker.
    NoMatchNothingMarker,
    /// A template placeholder has no value for this atom.
    TemplateUnbound,
    /// A value could not be formatted for the provider.
    RenderFormatFailed,
    /// A parameter-emitting atom sits under OR or NOT.
    ParamUnderDisjunction,

    // Orchestration
    /// The rendered query exceeds the configured maximum length.
    OutputBudgetExceeded,
}

impl IssueCode {
    /// Returns the stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::FieldNotSupported => "FIELD_NOT_SUPPORTED",
            IssueCode::OperatorNotAllowed => "OPERATOR_NOT_ALLOWED",
            IssueCode::NegationNotAllowed => "NEGATION_NOT_ALLOWED",
            IssueCode::MatchTypeNotAllowed => "MATCH_TYPE_NOT_ALLOWED",
            IssueCode::CaseSensitivityNotAllowed => "CASE_SENSITIVITY_NOT_ALLOWED",
            IssueCode::BlankTerm => "BLANK_TERM",
            IssueCode::TermTooShort => "TERM_TOO_SHORT",
            IssueCode::TermTooLong => "TERM_TOO_LONG",
            IssueCode::TermPatternMismatch => "TERM_PATTERN_MISMATCH",
            IssueCode::InListEmpty => "IN_LIST_EMPTY",
            IssueCode::InListTooLarge => "IN_LIST_TOO_LARGE",
            IssueCode::InDuplicateValues => "IN_DUPLICATE_VALUES",
            IssueCode::RangeKindMismatch => "RANGE_KIND_MISMATCH",
            IssueCode::RangeOpenStartNotAllowed => "RANGE_OPEN_START_NOT_ALLOWED",
            IssueCode::RangeOpenEndNotAllowed => "RANGE_OPEN_END_NOT_ALLOWED",
            IssueCode::RangeBelowMin => "RANGE_BELOW_MIN",
            IssueCode::RangeAboveMax => "RANGE_ABOVE_MAX",
            IssueCode::RangeInverted => "RANGE_INVERTED",
            IssueCode::ExistsNotSupported => "EXISTS_NOT_SUPPORTED",
            IssueCode::TokenKindNotAllowed => "TOKEN_KIND_NOT_ALLOWED",
            IssueCode::TokenPatternMismatch => "TOKEN_PATTERN_MISMATCH",
            IssueCode::RenderRuleMissing => "RENDER_RULE_MISSING",
            IssueCode::NegationUnsupported => "NEGATION_UNSUPPORTED",
            IssueCode::NoMatchNothingMarker => "NO_MATCH_NOTHING_MARKER",
            IssueCode::TemplateUnbound => "TEMPLATE_UNBOUND",
            IssueCode::RenderFormatFailed => "RENDER_FORMAT_FAILED",
            IssueCode::ParamUnderDisjunction => "PARAM_UNDER_DISJUNCTION",
            IssueCode::OutputBudgetExceeded => "OUTPUT_BUDGET_EXCEEDED",
        }
    }

    /// Returns the error kind this code belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssueCode::RenderRuleMissing
            | IssueCode::NegationUnsupported
            | IssueCode::NoMatchNothingMarker
            | IssueCode::TemplateUnbound
            | IssueCode::RenderFormatFailed
            | IssueCode::ParamUnderDisjunction => ErrorKind::RenderRuleMissing,
            IssueCode::OutputBudgetExceeded => ErrorKind::OutputBudgetExceeded,
            _ => ErrorKind::CapabilityViolation,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic: a stable code, a human message and structured context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity.
    pub severity: Severity,
    /// Stable code.
    pub code: IssueCode,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable context (field, operator, offending value, limits).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Issue {
    /// Creates an issue.
    pub fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Creates an error issue.
    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning issue.
    pub fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Adds a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Returns true for error severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Returns the error kind of the code.
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
    }
}

/// Warnings and errors collected over one compile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Warning-severity issues, in discovery order.
    pub warnings: Vec<Issue>,
    /// Error-severity issues, in discovery order.
    pub errors: Vec<Issue>,
}

impl ValidationReport {
    /// Adds an issue, routed by severity.
    pub fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Warning => self.warnings.push(issue),
            Severity::Error => self.errors.push(issue),
        }
    }

    /// Returns true if any error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if nothing at all was recorded.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    /// Kind of the first error, if any.
    pub fn first_error_kind(&self) -> Option<ErrorKind> {
        self.errors.first().map(Issue::kind)
    }

    /// Returns true if an issue with the code was recorded.
    pub fn contains(&self, code: IssueCode) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|issue| issue.code == code)
    }
}

impl Extend<Issue> for ValidationReport {
    fn extend<I: IntoIterator<Item = Issue>>(&mut self, iter: I) {
        for issue in iter {
            self.push(issue);
        }
    }
}
