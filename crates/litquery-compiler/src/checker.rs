//! Capability checker.
//!
//! Validates every atom of a tree against the capability declaration that
//! governs its field at the snapshot's capture instant. Every violation is
//! reported; nothing short-circuits across atoms.

use std::cmp::Ordering;

use litquery_expr::{Atom, AtomValue, Expr, InValue, RangeBound, RangeValue, TermValue, TokenValue};

use crate::issue::{Issue, IssueCode, Severity};
use crate::snapshot::{
    BoundsEnforcement, CapabilityDeclaration, InCapability, ProvenanceSnapshot, RangeCapability,
    TermCapability,
};

/// Checks every atom of `expr` against the snapshot's capabilities.
///
/// Returns warnings and errors in atom order. In strict mode soft range
/// limit violations are errors.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use litquery_compiler::{check, IssueCode, ProvenanceSnapshot};
/// use litquery_expr::builder::phrase;
/// use litquery_expr::Expr;
///
/// let snapshot = ProvenanceSnapshot::new(1, "crossref", "harvest", "search", 1, Utc::now());
/// let issues = check(&Expr::from(phrase("title", "graphs")), &snapshot, false);
/// assert_eq!(issues[0].code, IssueCode::FieldNotSupported);
/// ```
pub fn check(expr: &Expr, snapshot: &ProvenanceSnapshot, strict: bool) -> Vec<Issue> {
    let checker = Checker { snapshot, strict };
    let mut issues = Vec::new();
    checker.walk(expr, false, &mut issues);
    issues
}

struct Checker<'a> {
    snapshot: &'a ProvenanceSnapshot,
    strict: bool,
}

impl Checker<'_> {
    /// Visits atoms in order. `negated` is true under an odd number of `Not`s.
    fn walk(&self, expr: &Expr, negated: bool, out: &mut Vec<Issue>) {
        match expr {
            Expr::Const(_) => {}
            Expr::Atom(atom) => self.check_atom(atom, atom.negated != negated, out),
            Expr::And(children) | Expr::Or(children) => {
                for child in children.iter() {
                    self.walk(child, negated, out);
                }
            }
            Expr::Not(child) => self.walk(child, !negated, out),
        }
    }

    fn check_atom(&self, atom: &Atom, negated: bool, out: &mut Vec<Issue>) {
        let operator = atom.operator();
        let located = |issue: Issue| {
            issue
                .with_context("field", &atom.field)
                .with_context("operator", operator)
        };

        let Some(decl) = self.snapshot.capabilities.resolve(
            &atom.field,
            &self.snapshot.operation,
            &self.snapshot.task_type,
            self.snapshot.captured_at,
        ) else {
            out.push(located(
                Issue::error(
                    IssueCode::FieldNotSupported,
                    format!(
                        "field '{}' not supported for this provenance",
                        atom.field
                    ),
                )
                .with_context("provenance", &self.snapshot.code),
            ));
            return;
        };

        let allowed = decl.operators.contains(&operator);
        if !allowed {
            out.push(located(Issue::error(
                IssueCode::OperatorNotAllowed,
                format!("operator {} not allowed on field '{}'", operator, atom.field),
            )));
        }

        if negated && !decl.negatable_operators.contains(&operator) {
            out.push(located(Issue::error(
                IssueCode::NegationNotAllowed,
                format!(
                    "negation of {} not allowed on field '{}'",
                    operator, atom.field
                ),
            )));
        }

        // Value checks only apply to an allowed operator.
        if !allowed {
            return;
        }

        let mut found = Vec::new();
        match &atom.value {
            AtomValue::Term(term) => check_term(term, decl, &mut found),
            AtomValue::In(list) => check_in(list, decl, &mut found),
            AtomValue::Range(range) => self.check_range(range, decl, &mut found),
            AtomValue::Exists(_) => {
                if !decl.exists_supported {
                    found.push(Issue::error(
                        IssueCode::ExistsNotSupported,
                        format!("EXISTS not supported on field '{}'", atom.field),
                    ));
                }
            }
            AtomValue::Token(token) => check_token(token, decl, &mut found),
        }
        out.extend(found.into_iter().map(located));
    }

    fn check_range(&self, range: &RangeValue, decl: &CapabilityDeclaration, out: &mut Vec<Issue>) {
        let Some(cap) = decl.range.as_ref() else {
            check_inverted(range, out);
            return;
        };

        if cap.kind != range.kind {
            out.push(
                Issue::error(
                    IssueCode::RangeKindMismatch,
                    format!("range kind mismatch: declared {}, got {}", cap.kind, range.kind),
                )
                .with_context("expected_kind", cap.kind)
                .with_context("actual_kind", range.kind),
            );
            return;
        }

        if range.is_open_start() && !cap.allow_open_start {
            out.push(Issue::error(
                IssueCode::RangeOpenStartNotAllowed,
                "open range start not allowed",
            ));
        }
        if range.is_open_end() && !cap.allow_open_end {
            out.push(Issue::error(
                IssueCode::RangeOpenEndNotAllowed,
                "open range end not allowed",
            ));
        }

        self.check_limits(range, cap, out);
        check_inverted(range, out);
    }

    fn check_limits(&self, range: &RangeValue, cap: &RangeCapability, out: &mut Vec<Issue>) {
        // Limits that fail to parse are rejected when the snapshot is loaded.
        let min = cap.min_bound().ok().flatten();
        let max = cap.max_bound().ok().flatten();
        let severity = match (cap.bounds_enforcement, self.strict) {
            (BoundsEnforcement::Soft, false) => Severity::Warning,
            _ => Severity::Error,
        };

        for bound in [range.lower.as_ref(), range.upper.as_ref()].into_iter().flatten() {
            if let Some(min) = &min {
                if bound.compare(min) == Some(Ordering::Less) {
                    out.push(limit_issue(severity, IssueCode::RangeBelowMin, bound, "minimum", min));
                }
            }
            if let Some(max) = &max {
                if bound.compare(max) == Some(Ordering::Greater) {
                    out.push(limit_issue(severity, IssueCode::RangeAboveMax, bound, "maximum", max));
                }
            }
        }
    }
}

fn limit_issue(
    severity: Severity,
    code: IssueCode,
    bound: &RangeBound,
    which: &str,
    limit: &RangeBound,
) -> Issue {
    Issue::new(
        severity,
        code,
        format!("range bound {} outside declared {} {}", bound, which, limit),
    )
    .with_context("value", bound)
    .with_context("limit", limit)
}

fn check_inverted(range: &RangeValue, out: &mut Vec<Issue>) {
    if range.is_inverted() {
        let mut issue = Issue::error(IssueCode::RangeInverted, "range lower bound exceeds upper bound");
        if let (Some(lower), Some(upper)) = (&range.lower, &range.upper) {
            issue = issue.with_context("lower", lower).with_context("upper", upper);
        }
        out.push(issue);
    }
}

fn check_term(term: &TermValue, decl: &CapabilityDeclaration, out: &mut Vec<Issue>) {
    let default;
    let cap = match &decl.term {
        Some(cap) => cap,
        None => {
            default = TermCapability::default();
            &default
        }
    };

    if !cap.match_types.contains(&term.match_type) {
        out.push(
            Issue::error(
                IssueCode::MatchTypeNotAllowed,
                format!("match type {} not allowed", term.match_type),
            )
            .with_context("match_type", term.match_type),
        );
    }

    if term.is_case_sensitive() && !cap.case_sensitive_allowed {
        out.push(Issue::error(
            IssueCode::CaseSensitivityNotAllowed,
            "case-sensitive matching not allowed",
        ));
    }

    if term.is_blank() {
        if !cap.allow_blank {
            out.push(Issue::error(IssueCode::BlankTerm, "blank term text not allowed"));
        }
        return;
    }

    let length = term.text.chars().count();
    if let Some(min) = cap.min_length.filter(|min| length < *min) {
        out.push(
            Issue::error(
                IssueCode::TermTooShort,
                format!("term text has {} characters, minimum is {}", length, min),
            )
            .with_context("length", length)
            .with_context("min_length", min),
        );
    }
    if let Some(max) = cap.max_length.filter(|max| length > *max) {
        out.push(
            Issue::error(
                IssueCode::TermTooLong,
                format!("term text has {} characters, maximum is {}", length, max),
            )
            .with_context("length", length)
            .with_context("max_length", max),
        );
    }
    if let Some(pattern) = cap.pattern.as_ref().filter(|p| !p.is_match(&term.text)) {
        out.push(
            Issue::error(
                IssueCode::TermPatternMismatch,
                format!("term text does not match pattern {}", pattern),
            )
            .with_context("value", &term.text)
            .with_context("pattern", pattern),
        );
    }
}

fn check_in(list: &InValue, decl: &CapabilityDeclaration, out: &mut Vec<Issue>) {
    let default;
    let cap = match &decl.in_list {
        Some(cap) => cap,
        None => {
            default = InCapability::default();
            &default
        }
    };

    if list.values.is_empty() {
        out.push(Issue::error(IssueCode::InListEmpty, "IN list is empty"));
        return;
    }

    let distinct = list.distinct_values().len();
    if let Some(max) = cap.max_size.filter(|max| distinct > *max) {
        out.push(
            Issue::error(
                IssueCode::InListTooLarge,
                format!("IN list has {} distinct values, maximum is {}", distinct, max),
            )
            .with_context("size", distinct)
            .with_context("max_size", max),
        );
    }
    if distinct != list.values.len() {
        out.push(
            Issue::warning(
                IssueCode::InDuplicateValues,
                format!(
                    "IN list repeats values; {} of {} are distinct",
                    distinct,
                    list.values.len()
                ),
            )
            .with_context("size", list.values.len())
            .with_context("distinct", distinct),
        );
    }
    if list.case_sensitive && !cap.case_sensitive_allowed {
        out.push(Issue::error(
            IssueCode::CaseSensitivityNotAllowed,
            "case-sensitive IN comparison not allowed",
        ));
    }
}

fn check_token(token: &TokenValue, decl: &CapabilityDeclaration, out: &mut Vec<Issue>) {
    let Some(cap) = decl.token.as_ref() else {
        return;
    };
    if !cap.kinds.is_empty() && !cap.kinds.contains(&token.kind) {
        out.push(
            Issue::error(
                IssueCode::TokenKindNotAllowed,
                format!("token kind '{}' not allowed", token.kind),
            )
            .with_context("token_kind", &token.kind),
        );
    }
    if let Some(pattern) = cap.pattern.as_ref().filter(|p| !p.is_match(&token.value)) {
        out.push(
            Issue::error(
                IssueCode::TokenPatternMismatch,
                format!("token value does not match pattern {}", pattern),
            )
            .with_context("value", &token.value)
            .with_context("pattern", pattern),
        );
    }
}
