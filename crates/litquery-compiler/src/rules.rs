//! Render rule selection.
//!
//! Rules are bucketed by (field, operator) with wildcard buckets for either
//! key, so a lookup touches at most four buckets. The remaining dimensions
//! (match type, negation, value type, scope, task type, effective window)
//! are filtered per candidate.
//!
//! Among matching rules the winner is the one with the most pinned
//! dimensions, then the highest priority, then the smallest `rule_id`.

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use litquery_expr::{Atom, AtomValue, MatchType, Operator};

use crate::snapshot::{ProvenanceSnapshot, RenderRule};

type OperatorBuckets<'a> = HashMap<Option<Operator>, Vec<&'a RenderRule>>;

/// The atom-side keys a rule is matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleQuery<'q> {
    /// Field key.
    pub field: &'q str,
    /// Operator.
    pub operator: Operator,
    /// TERM match type (None for other operators).
    pub match_type: Option<MatchType>,
    /// Atom negation.
    pub negated: bool,
    /// Value type discriminator.
    pub value_type: &'q str,
}

impl<'q> RuleQuery<'q> {
    /// Builds the query for an atom.
    pub fn for_atom(atom: &'q Atom) -> Self {
        let match_type = match &atom.value {
            AtomValue::Term(term) => Some(term.match_type),
            _ => None,
        };
        Self {
            field: &atom.field,
            operator: atom.operator(),
            match_type,
            negated: atom.negated,
            value_type: atom.value.value_type(),
        }
    }

    /// The same query with the negation flag replaced.
    pub fn with_negated(&self, negated: bool) -> Self {
        Self {
            negated,
            ..self.clone()
        }
    }
}

/// How the negation dimension is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NegationMatch {
    /// The rule must be declared for negated atoms.
    Explicit,
    /// Wildcard rules match as well.
    Lenient,
}

/// Pre-indexed render rules of one snapshot.
#[derive(Debug)]
pub struct RuleIndex<'a> {
    by_field: HashMap<&'a str, OperatorBuckets<'a>>,
    any_field: OperatorBuckets<'a>,
    scope: &'a str,
    task_type: &'a str,
    at: DateTime<Utc>,
}

impl<'a> RuleIndex<'a> {
    /// Indexes the rules of a snapshot, evaluated at its capture instant.
    pub fn new(snapshot: &'a ProvenanceSnapshot) -> Self {
        let mut by_field: HashMap<&'a str, OperatorBuckets<'a>> = HashMap::new();
        let mut any_field: OperatorBuckets<'a> = HashMap::new();

        for rule in &snapshot.render_rules.rules {
            let buckets = match rule.field_key.as_deref() {
                Some(field) => by_field.entry(field).or_default(),
                None => &mut any_field,
            };
            buckets.entry(rule.operator).or_default().push(rule);
        }

        Self {
            by_field,
            any_field,
            scope: &snapshot.operation,
            task_type: &snapshot.task_type,
            at: snapshot.captured_at,
        }
    }

    /// Number of indexed rules.
    pub fn len(&self) -> usize {
        self.by_field
            .values()
            .chain(std::iter::once(&self.any_field))
            .flat_map(|buckets| buckets.values())
            .map(Vec::len)
            .sum()
    }

    /// Returns true if no rules are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best rule for the query. A rule's `negated` key is a wildcard when unset.
    pub fn select(&self, query: &RuleQuery<'_>) -> Option<&'a RenderRule> {
        self.best(query, NegationMatch::Lenient)
    }

    /// Best rule explicitly declared for negated atoms.
    pub fn select_negated(&self, query: &RuleQuery<'_>) -> Option<&'a RenderRule> {
        self.best(&query.with_negated(true), NegationMatch::Explicit)
    }

    fn best(&self, query: &RuleQuery<'_>, negation: NegationMatch) -> Option<&'a RenderRule> {
        let field_buckets = self.by_field.get(query.field);
        let buckets = [field_buckets, Some(&self.any_field)];

        buckets
            .into_iter()
            .flatten()
            .flat_map(|b| {
                let exact = b.get(&Some(query.operator)).into_iter().flatten();
                let any = b.get(&None).into_iter().flatten();
                exact.chain(any)
            })
            .copied()
            .filter(|rule| self.matches(rule, query, negation))
            .max_by(|a, b| rank(a, b))
    }

    fn matches(&self, rule: &RenderRule, query: &RuleQuery<'_>, negation: NegationMatch) -> bool {
        let negated_ok = match negation {
            NegationMatch::Explicit => rule.negated == Some(true),
            NegationMatch::Lenient => rule.negated.map_or(true, |n| n == query.negated),
        };

        negated_ok
            && rule.match_type.map_or(true, |m| query.match_type == Some(m))
            && rule
                .value_type
                .as_deref()
                .map_or(true, |v| v.eq_ignore_ascii_case(query.value_type))
            && rule.scope.as_deref().map_or(true, |s| s == self.scope)
            && rule.task_type.as_deref().map_or(true, |t| t == self.task_type)
            && rule.effective.contains(self.at)
    }
}

fn rank(a: &RenderRule, b: &RenderRule) -> Ordering {
    let key = |r: &RenderRule| (r.specificity(), r.priority);
    key(a)
        .cmp(&key(b))
        .then_with(|| Reverse(a.rule_id.as_str()).cmp(&Reverse(b.rule_id.as_str())))
}
