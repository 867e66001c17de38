//! Template-driven renderer.
//!
//! Walks a normalized, checked tree bottom-up and turns every atom into a
//! fragment through its best-matching render rule. Fragments either join
//! into the query string or go to the parameter map.
//!
//! # Rendering Rules
//!
//! | Node | Output |
//! |------|--------|
//! | `Const(true)` | empty fragment, absorbed by the parent |
//! | `Const(false)` | the dialect's match-nothing marker |
//! | `Atom` | the selected rule's template |
//! | `And` / `Or` | non-empty child fragments joined, grouped when more than one |
//! | `Not` | the dialect's negation wrapper around the child fragment |
//!
//! A negated atom prefers a rule declared for `negated=true`; otherwise the
//! positive rule is rendered and wrapped in the negation template.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::FixedOffset;
use litquery_expr::value::DATE_FORMAT;
use litquery_expr::{Atom, AtomValue, Expr, RangeBound, RangeValue};

use crate::issue::{Issue, IssueCode};
use crate::result::{RenderTrace, TraceRecord};
use crate::rules::{RuleIndex, RuleQuery};
use crate::snapshot::{EmitTarget, ProvenanceSnapshot, RenderDialect, RenderRule};
use crate::template::{Placeholder, Template};

/// Default output format for DATETIME bounds, always in UTC.
pub const UTC_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const DEFAULT_OPEN_BOUND: &str = "*";

/// Renderer output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    /// Query string.
    pub query: String,
    /// Parameters from parameter-emitting rules.
    pub params: BTreeMap<String, String>,
    /// Render warnings and errors.
    pub issues: Vec<Issue>,
    /// Rule applications, when requested.
    pub trace: Option<RenderTrace>,
}

impl RenderOutput {
    /// Returns true if any error issue was recorded.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }
}

/// Renders a normalized tree with the snapshot's render rules.
///
/// Naive DATETIME bounds are interpreted at `tz`. The tree should have passed
/// [`check`](crate::check) without errors; atoms with no matching rule are
/// reported as `RENDER_RULE_MISSING`.
pub fn render(
    expr: &Expr,
    snapshot: &ProvenanceSnapshot,
    tz: FixedOffset,
    trace_enabled: bool,
) -> RenderOutput {
    let mut renderer = Renderer {
        index: RuleIndex::new(snapshot),
        dialect: &snapshot.render_rules.dialect,
        tz,
        params: BTreeMap::new(),
        issues: Vec::new(),
        trace: trace_enabled.then(Vec::new),
    };
    let query = renderer.node(expr, Position::default());

    RenderOutput {
        query,
        params: renderer.params,
        issues: renderer.issues,
        trace: renderer.trace.map(|records| RenderTrace { records }),
    }
}

/// Where a node sits in the tree.
#[derive(Debug, Clone, Copy, Default)]
struct Position {
    under_or: bool,
    under_not: bool,
}

struct Renderer<'a> {
    index: RuleIndex<'a>,
    dialect: &'a RenderDialect,
    tz: FixedOffset,
    params: BTreeMap<String, String>,
    issues: Vec<Issue>,
    trace: Option<Vec<TraceRecord>>,
}

impl<'a> Renderer<'a> {
    fn node(&mut self, expr: &Expr, pos: Position) -> String {
        let dialect = self.dialect;
        match expr {
            Expr::Const(true) => String::new(),
            Expr::Const(false) => match &dialect.match_nothing {
                Some(marker) => marker.clone(),
                None => {
                    self.issues.push(Issue::error(
                        IssueCode::NoMatchNothingMarker,
                        "provider has no match-nothing marker to render false",
                    ));
                    String::new()
                }
            },
            Expr::Atom(atom) => self.atom(atom, pos),
            Expr::And(children) => self.group(children, &dialect.and_joiner, pos),
            Expr::Or(children) => {
                let pos = Position {
                    under_or: true,
                    ..pos
                };
                self.group(children, &dialect.or_joiner, pos)
            }
            Expr::Not(child) => {
                let inner = self.node(
                    child,
                    Position {
                        under_not: true,
                        ..pos
                    },
                );
                if inner.is_empty() {
                    return inner;
                }
                self.negate(&inner, None).unwrap_or_default()
            }
        }
    }

    fn group(&mut self, children: &[Expr], joiner: &str, pos: Position) -> String {
        let fragments: Vec<String> = children
            .iter()
            .map(|child| self.node(child, pos))
            .filter(|fragment| !fragment.is_empty())
            .collect();
        match fragments.len() {
            0 => String::new(),
            1 => fragments.into_iter().collect(),
            _ => self.dialect.group(&fragments.join(joiner)),
        }
    }

    /// Applies the dialect's negation wrapper.
    fn negate(&mut self, inner: &str, field: Option<&str>) -> Option<String> {
        let dialect = self.dialect;
        let Some(template) = &dialect.not_template else {
            let mut issue =
                Issue::error(IssueCode::NegationUnsupported, "provider has no negation syntax");
            if let Some(field) = field {
                issue = issue.with_context("field", field);
            }
            self.issues.push(issue);
            return None;
        };
        let rendered = template.render(|slot| match slot {
            Placeholder::Value => Some(inner.to_string()),
            Placeholder::Field => field.map(str::to_string),
            _ => None,
        });
        match rendered {
            Ok(text) => Some(text),
            Err(slot) => {
                self.issues.push(unbound(template, &slot, "dialect"));
                None
            }
        }
    }

    fn atom(&mut self, atom: &Atom, pos: Position) -> String {
        let query = RuleQuery::for_atom(atom);
        let (rule, wrap) = if atom.negated {
            match self.index.select_negated(&query) {
                Some(rule) => (Some(rule), false),
                None => (self.index.select(&query.with_negated(false)), true),
            }
        } else {
            (self.index.select(&query), false)
        };

        let Some(rule) = rule else {
            self.issues.push(
                Issue::error(
                    IssueCode::RenderRuleMissing,
                    format!(
                        "no render rule for field/operator combination {}/{}",
                        atom.field,
                        atom.operator()
                    ),
                )
                .with_context("field", &atom.field)
                .with_context("operator", atom.operator())
                .with_context("negated", atom.negated),
            );
            return String::new();
        };

        let mut fragment = match apply(rule, atom, self.dialect, self.tz) {
            Ok(fragment) => fragment,
            Err(issue) => {
                self.issues.push(
                    issue
                        .with_context("field", &atom.field)
                        .with_context("rule_id", &rule.rule_id),
                );
                return String::new();
            }
        };
        if rule.wrap_group {
            fragment = self.dialect.group(&fragment);
        }
        if wrap {
            match self.negate(&fragment, Some(&atom.field)) {
                Some(negated) => fragment = negated,
                None => return String::new(),
            }
        }

        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceRecord {
                field: atom.field.clone(),
                operator: atom.operator(),
                rule_id: rule.rule_id.clone(),
                negated: atom.negated,
                negation_wrapped: wrap,
                emit: rule.emit,
                param_key: rule.param_key.clone(),
                fragment: fragment.clone(),
            });
        }

        match (rule.emit, rule.param_key.as_deref()) {
            (EmitTarget::Params, Some(key)) => {
                if pos.under_or || pos.under_not || atom.negated {
                    self.issues.push(
                        Issue::warning(
                            IssueCode::ParamUnderDisjunction,
                            format!(
                                "parameter '{}' emitted under OR/NOT; the provider applies it unconditionally",
                                key
                            ),
                        )
                        .with_context("field", &atom.field)
                        .with_context("param", key),
                    );
                }
                match self.params.get_mut(key) {
                    Some(existing) => {
                        existing.push_str(&self.dialect.param_joiner);
                        existing.push_str(&fragment);
                    }
                    None => {
                        self.params.insert(key.to_string(), fragment);
                    }
                }
                String::new()
            }
            _ => fragment,
        }
    }
}

fn unbound(template: &Template, slot: &Placeholder, owner: &str) -> Issue {
    Issue::error(
        IssueCode::TemplateUnbound,
        format!("placeholder {} has no value in template '{}'", slot, template),
    )
    .with_context("placeholder", slot)
    .with_context("template_owner", owner)
}

/// Values available to a rule's templates for one atom.
#[derive(Debug, Default)]
struct Bindings {
    field: String,
    value: Option<String>,
    values: Option<String>,
    lower: Option<String>,
    upper: Option<String>,
    lower_bracket: Option<String>,
    upper_bracket: Option<String>,
    kind: Option<String>,
    expected: Option<String>,
    token_kind: Option<String>,
    match_type: Option<String>,
}

impl Bindings {
    fn lookup(&self, slot: &Placeholder, rule: &RenderRule, item: Option<&str>) -> Option<String> {
        match slot {
            Placeholder::Field => Some(self.field.clone()),
            Placeholder::Value => item.map(str::to_string).or_else(|| self.value.clone()),
            Placeholder::Quoted => item.or(self.value.as_deref()).map(quote),
            Placeholder::Item => item.map(str::to_string),
            Placeholder::Values => self.values.clone(),
            Placeholder::Lower => self.lower.clone(),
            Placeholder::Upper => self.upper.clone(),
            Placeholder::LowerBracket => self.lower_bracket.clone(),
            Placeholder::UpperBracket => self.upper_bracket.clone(),
            Placeholder::Kind => self.kind.clone(),
            Placeholder::Expected => self.expected.clone(),
            Placeholder::TokenKind => self.token_kind.clone(),
            Placeholder::MatchType => self.match_type.clone(),
            Placeholder::Param(name) => rule.params.get(name).cloned(),
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn apply(rule: &RenderRule, atom: &Atom, dialect: &RenderDialect, tz: FixedOffset) -> Result<String, Issue> {
    let transform = |text: &str| match rule.transform {
        Some(t) => t.apply(text),
        None => text.to_string(),
    };

    let mut bindings = Bindings {
        field: atom.field.clone(),
        ..Bindings::default()
    };

    match &atom.value {
        AtomValue::Term(term) => {
            bindings.value = Some(transform(&term.text));
            bindings.match_type = Some(term.match_type.to_string());
        }
        AtomValue::In(list) => {
            let joiner = rule.joiner.as_deref().unwrap_or(&dialect.or_joiner);
            let mut items = Vec::with_capacity(list.values.len());
            for value in list.distinct_values() {
                let value = transform(value);
                let item = match &rule.item_template {
                    Some(template) => template
                        .render(|slot| bindings.lookup(slot, rule, Some(value.as_str())))
                        .map_err(|slot| unbound(template, &slot, &rule.rule_id))?,
                    None => value,
                };
                items.push(item);
            }
            bindings.values = Some(items.join(joiner));
        }
        AtomValue::Range(range) => bind_range(&mut bindings, range, rule, tz, &transform)?,
        AtomValue::Exists(exists) => {
            bindings.expected = Some(exists.expected.to_string());
        }
        AtomValue::Token(token) => {
            bindings.value = Some(transform(&token.value));
            bindings.token_kind = Some(token.kind.clone());
        }
    }

    rule.template
        .render(|slot| bindings.lookup(slot, rule, None))
        .map_err(|slot| unbound(&rule.template, &slot, &rule.rule_id))
}

fn bind_range(
    bindings: &mut Bindings,
    range: &RangeValue,
    rule: &RenderRule,
    tz: FixedOffset,
    transform: &dyn Fn(&str) -> String,
) -> Result<(), Issue> {
    let open = rule
        .params
        .get("open_bound")
        .map_or(DEFAULT_OPEN_BOUND, String::as_str);
    let bound = |bound: Option<&RangeBound>| -> Result<String, Issue> {
        match bound {
            Some(b) => format_bound(b, rule, tz).map(|text| transform(&text)),
            None => Ok(open.to_string()),
        }
    };
    let bracket = |inclusive: bool, inclusive_key: &str, exclusive_key: &str, on: &str, off: &str| {
        let (key, fallback) = if inclusive {
            (inclusive_key, on)
        } else {
            (exclusive_key, off)
        };
        rule.params.get(key).cloned().unwrap_or_else(|| fallback.to_string())
    };

    bindings.lower = Some(bound(range.lower.as_ref())?);
    bindings.upper = Some(bound(range.upper.as_ref())?);
    bindings.lower_bracket = Some(bracket(
        range.include_lower,
        "lower_inclusive",
        "lower_exclusive",
        "[",
        "{",
    ));
    bindings.upper_bracket = Some(bracket(
        range.include_upper,
        "upper_inclusive",
        "upper_exclusive",
        "]",
        "}",
    ));
    bindings.kind = Some(range.kind.to_string());
    Ok(())
}

fn format_bound(bound: &RangeBound, rule: &RenderRule, tz: FixedOffset) -> Result<String, Issue> {
    let mut out = String::new();
    let written = match bound {
        RangeBound::Date(date) => {
            let format = rule.params.get("date_format").map_or(DATE_FORMAT, String::as_str);
            write!(out, "{}", date.format(format))
        }
        RangeBound::DateTime(value) => {
            let Some(utc) = value.to_utc(tz) else {
                return Err(format_failed(bound, "date-time not representable in UTC"));
            };
            let format = rule
                .params
                .get("datetime_format")
                .map_or(UTC_DATETIME_FORMAT, String::as_str);
            write!(out, "{}", utc.format(format))
        }
        RangeBound::Number(number) => write!(out, "{}", number),
    };
    written.map_err(|_| format_failed(bound, "format string rejected"))?;
    Ok(out)
}

fn format_failed(bound: &RangeBound, message: &str) -> Issue {
    Issue::error(
        IssueCode::RenderFormatFailed,
        format!("cannot format range bound {}: {}", bound, message),
    )
    .with_context("value", bound)
}
