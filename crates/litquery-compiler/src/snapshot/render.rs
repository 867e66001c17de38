//! Render rules: how validated atoms become provider query text.

use std::collections::BTreeMap;

use litquery_expr::{MatchType, Operator};
use serde::{Deserialize, Serialize};

use super::EffectiveWindow;
use crate::template::Template;

/// Where a rendered atom goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmitTarget {
    /// Into the query string.
    #[default]
    Query,
    /// Into the parameter map under the rule's `param_key`.
    Params,
}

/// Named value transforms applied before substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Lowercase.
    Lowercase,
    /// Uppercase.
    Uppercase,
    /// Strip surrounding whitespace.
    Trim,
    /// Backslash-escape `"` and `\`.
    EscapeQuotes,
    /// Backslash-escape Lucene syntax characters.
    EscapeLucene,
    /// Drop `-` and `:` separators (`2024-01-31` → `20240131`).
    CompactDate,
    /// Keep the leading year digits (`2024-01-31` → `2024`).
    Year,
}

const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/', '&', '|',
];

impl Transform {
    /// Applies the transform.
    pub fn apply(&self, input: &str) -> String {
        match self {
            Transform::Lowercase => input.to_lowercase(),
            Transform::Uppercase => input.to_uppercase(),
            Transform::Trim => input.trim().to_string(),
            Transform::EscapeQuotes => escape(input, &['"', '\\']),
            Transform::EscapeLucene => escape(input, LUCENE_SPECIAL),
            Transform::CompactDate => input.chars().filter(|c| *c != '-' && *c != ':').collect(),
            Transform::Year => input.chars().take_while(char::is_ascii_digit).collect(),
        }
    }
}

fn escape(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    for c in input.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One declarative render rule.
///
/// Every `Option` key is a wildcard when `None`. The more keys a rule pins
/// down, the more specific it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRule {
    /// Stable rule identity, reported in traces.
    pub rule_id: String,
    /// Field key.
    #[serde(default)]
    pub field_key: Option<String>,
    /// Operation code.
    #[serde(default)]
    pub scope: Option<String>,
    /// Task type.
    #[serde(default)]
    pub task_type: Option<String>,
    /// Operator.
    #[serde(default)]
    pub operator: Option<Operator>,
    /// TERM match type.
    #[serde(default)]
    pub match_type: Option<MatchType>,
    /// Atom negation.
    #[serde(default)]
    pub negated: Option<bool>,
    /// Value type (`TEXT`, `LIST`, range kind, `PRESENT`/`ABSENT`, token kind).
    #[serde(default)]
    pub value_type: Option<String>,
    /// Output target.
    #[serde(default)]
    pub emit: EmitTarget,
    /// Parameter name when `emit` is `PARAMS`.
    #[serde(default)]
    pub param_key: Option<String>,
    /// Main template.
    pub template: Template,
    /// Per-item template for IN values.
    #[serde(default)]
    pub item_template: Option<Template>,
    /// Separator between IN items (default: the dialect's OR joiner).
    #[serde(default)]
    pub joiner: Option<String>,
    /// Wrap the fragment in group delimiters.
    #[serde(default)]
    pub wrap_group: bool,
    /// Tie-breaker among equally specific rules (higher wins).
    #[serde(default)]
    pub priority: i32,
    /// Free-form parameters (`{param:NAME}`, `date_format`, `datetime_format`, `open_bound`).
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Transform applied to every formatted value.
    #[serde(default)]
    pub transform: Option<Transform>,
    /// When the rule is active.
    #[serde(default)]
    pub effective: EffectiveWindow,
}

impl RenderRule {
    /// Creates a fully wildcarded query rule.
    pub fn new(rule_id: impl Into<String>, template: Template) -> Self {
        Self {
            rule_id: rule_id.into(),
            field_key: None,
            scope: None,
            task_type: None,
            operator: None,
            match_type: None,
            negated: None,
            value_type: None,
            emit: EmitTarget::Query,
            param_key: None,
            template,
            item_template: None,
            joiner: None,
            wrap_group: false,
            priority: 0,
            params: BTreeMap::new(),
            transform: None,
            effective: EffectiveWindow::default(),
        }
    }

    /// Pins the field key.
    pub fn for_field(mut self, field: impl Into<String>) -> Self {
        self.field_key = Some(field.into());
        self
    }

    /// Pins the operator.
    pub fn for_operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Pins the match type.
    pub fn for_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = Some(match_type);
        self
    }

    /// Pins the negation flag.
    pub fn for_negated(mut self, negated: bool) -> Self {
        self.negated = Some(negated);
        self
    }

    /// Pins the value type.
    pub fn for_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    /// Pins the operation code.
    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Emits into the parameter map.
    pub fn emit_param(mut self, key: impl Into<String>) -> Self {
        self.emit = EmitTarget::Params;
        self.param_key = Some(key.into());
        self
    }

    /// Sets the IN item template and joiner.
    pub fn with_items(mut self, item_template: Template, joiner: impl Into<String>) -> Self {
        self.item_template = Some(item_template);
        self.joiner = Some(joiner.into());
        self
    }

    /// Requests group delimiters around the fragment.
    pub fn wrapped(mut self) -> Self {
        self.wrap_group = true;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the value transform.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Sets the effective window.
    pub fn effective(mut self, window: EffectiveWindow) -> Self {
        self.effective = window;
        self
    }

    /// Number of pinned key dimensions.
    pub fn specificity(&self) -> usize {
        [
            self.field_key.is_some(),
            self.scope.is_some(),
            self.task_type.is_some(),
            self.operator.is_some(),
            self.match_type.is_some(),
            self.negated.is_some(),
            self.value_type.is_some(),
        ]
        .into_iter()
        .filter(|pinned| *pinned)
        .count()
    }
}

/// Provider-wide syntax used around atom fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDialect {
    /// Joiner between AND children.
    pub and_joiner: String,
    /// Joiner between OR children.
    pub or_joiner: String,
    /// Group opening delimiter.
    pub group_open: String,
    /// Group closing delimiter.
    pub group_close: String,
    /// Negation wrapper; `{value}` is the negated fragment. None = no negation syntax.
    pub not_template: Option<Template>,
    /// Fragment that never matches, used to render `false`.
    pub match_nothing: Option<String>,
    /// Joiner when several atoms emit into the same parameter.
    pub param_joiner: String,
}

impl Default for RenderDialect {
    fn default() -> Self {
        Self {
            and_joiner: " AND ".to_string(),
            or_joiner: " OR ".to_string(),
            group_open: "(".to_string(),
            group_close: ")".to_string(),
            not_template: Template::parse("NOT {value}").ok(),
            match_nothing: None,
            param_joiner: ",".to_string(),
        }
    }
}

impl RenderDialect {
    /// Wraps a fragment in group delimiters.
    pub fn group(&self, fragment: &str) -> String {
        format!("{}{}{}", self.group_open, fragment, self.group_close)
    }
}

/// Dialect plus all render rules of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRuleSnapshot {
    /// Provider syntax.
    #[serde(default)]
    pub dialect: RenderDialect,
    /// Rules in registry order.
    #[serde(default)]
    pub rules: Vec<RenderRule>,
}

impl RenderRuleSnapshot {
    /// Creates a snapshot from a dialect and rules.
    pub fn new(dialect: RenderDialect, rules: Vec<RenderRule>) -> Self {
        Self { dialect, rules }
    }

    /// Adds a rule.
    pub fn rule(mut self, rule: RenderRule) -> Self {
        self.rules.push(rule);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(text: &str) -> Template {
        Template::parse(text).unwrap()
    }

    #[test]
    fn test_transforms() {
        assert_eq!(Transform::Lowercase.apply("Deep"), "deep");
        assert_eq!(Transform::Uppercase.apply("en"), "EN");
        assert_eq!(Transform::Trim.apply("  x "), "x");
        assert_eq!(Transform::EscapeQuotes.apply(r#"say "hi"\"#), r#"say \"hi\"\\"#);
        assert_eq!(Transform::EscapeLucene.apply("a+b:(c)"), r"a\+b\:\(c\)");
        assert_eq!(Transform::CompactDate.apply("2024-01-31"), "20240131");
        assert_eq!(Transform::Year.apply("2024-01-31"), "2024");
        assert_eq!(Transform::Year.apply("1999.0"), "1999");
    }

    #[test]
    fn test_transform_serde_names() {
        let t: Transform = serde_json::from_str(r#""escape_lucene""#).unwrap();
        assert_eq!(t, Transform::EscapeLucene);
        assert_eq!(serde_json::to_string(&Transform::CompactDate).unwrap(), r#""compact_date""#);
    }

    #[test]
    fn test_specificity_counts_pinned_keys() {
        let rule = RenderRule::new("r1", template("{field}"));
        assert_eq!(rule.specificity(), 0);
        let rule = rule
            .for_field("title")
            .for_operator(Operator::Term)
            .for_match_type(MatchType::Phrase);
        assert_eq!(rule.specificity(), 3);
    }

    #[test]
    fn test_dialect_defaults_from_partial_json() {
        let dialect: RenderDialect =
            serde_json::from_str(r#"{"match_nothing": "-*:*", "and_joiner": " && "}"#).unwrap();
        assert_eq!(dialect.and_joiner, " && ");
        assert_eq!(dialect.or_joiner, " OR ");
        assert_eq!(dialect.match_nothing.as_deref(), Some("-*:*"));
        assert_eq!(dialect.not_template.unwrap().as_str(), "NOT {value}");
        assert_eq!(RenderDialect::default().group("a OR b"), "(a OR b)");
    }

    #[test]
    fn test_rule_json() {
        let rule: RenderRule = serde_json::from_str(
            r#"{"rule_id":"lang-in","field_key":"lang","operator":"IN","template":"{field}:({values})","item_template":"{quoted}","joiner":" OR ","priority":5}"#,
        )
        .unwrap();
        assert_eq!(rule.operator, Some(Operator::In));
        assert_eq!(rule.emit, EmitTarget::Query);
        assert_eq!(rule.priority, 5);
        assert_eq!(rule.specificity(), 2);
    }
}
