//! Capability declarations: what a provider accepts per field.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use litquery_expr::{MatchType, Operator, RangeBound, RangeKind};
use serde::{Deserialize, Serialize};

use super::{EffectiveWindow, Pattern, SnapshotError};

/// How RANGE min/max violations are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoundsEnforcement {
    /// Always an error.
    #[default]
    Hard,
    /// A warning, escalated to an error in strict mode.
    Soft,
}

fn all_match_types() -> BTreeSet<MatchType> {
    MatchType::ALL.into_iter().collect()
}

fn yes() -> bool {
    true
}

/// TERM constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCapability {
    /// Allowed match types.
    #[serde(default = "all_match_types")]
    pub match_types: BTreeSet<MatchType>,
    /// Whether case-sensitive matching may be requested.
    #[serde(default)]
    pub case_sensitive_allowed: bool,
    /// Whether blank text is accepted.
    #[serde(default)]
    pub allow_blank: bool,
    /// Minimum text length in characters.
    #[serde(default)]
    pub min_length: Option<usize>,
    /// Maximum text length in characters.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Pattern the whole text must match.
    #[serde(default)]
    pub pattern: Option<Pattern>,
}

impl Default for TermCapability {
    fn default() -> Self {
        Self {
            match_types: all_match_types(),
            case_sensitive_allowed: false,
            allow_blank: false,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }
}

/// IN constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InCapability {
    /// Maximum number of distinct values.
    #[serde(default)]
    pub max_size: Option<usize>,
    /// Whether case-sensitive comparison may be requested.
    #[serde(default)]
    pub case_sensitive_allowed: bool,
}

/// RANGE constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeCapability {
    /// The only accepted range kind.
    pub kind: RangeKind,
    /// Whether the lower bound may be omitted.
    #[serde(default = "yes")]
    pub allow_open_start: bool,
    /// Whether the upper bound may be omitted.
    #[serde(default = "yes")]
    pub allow_open_end: bool,
    /// Smallest allowed bound, in the kind's text form.
    #[serde(default)]
    pub min: Option<String>,
    /// Largest allowed bound, in the kind's text form.
    #[serde(default)]
    pub max: Option<String>,
    /// How min/max violations are reported.
    #[serde(default)]
    pub bounds_enforcement: BoundsEnforcement,
}

impl RangeCapability {
    /// Creates a capability for one kind with open bounds allowed and no limits.
    pub fn new(kind: RangeKind) -> Self {
        Self {
            kind,
            allow_open_start: true,
            allow_open_end: true,
            min: None,
            max: None,
            bounds_enforcement: BoundsEnforcement::Hard,
        }
    }

    /// Parses `min` under the declared kind.
    pub fn min_bound(&self) -> Result<Option<RangeBound>, SnapshotError> {
        self.parse_limit(self.min.as_deref())
    }

    /// Parses `max` under the declared kind.
    pub fn max_bound(&self) -> Result<Option<RangeBound>, SnapshotError> {
        self.parse_limit(self.max.as_deref())
    }

    fn parse_limit(&self, text: Option<&str>) -> Result<Option<RangeBound>, SnapshotError> {
        text.map(|t| {
            RangeBound::parse(self.kind, t).map_err(|_| SnapshotError::InvalidBound {
                kind: self.kind,
                input: t.to_string(),
            })
        })
        .transpose()
    }
}

/// TOKEN constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCapability {
    /// Accepted token kinds (empty = any kind).
    #[serde(default)]
    pub kinds: BTreeSet<String>,
    /// Pattern the whole token value must match.
    #[serde(default)]
    pub pattern: Option<Pattern>,
}

/// What a provider accepts for one field.
///
/// A missing per-operator section means that operator has no extra
/// constraints beyond [`TermCapability::default`] and friends.
///
/// # Example
///
/// ```rust
/// use litquery_compiler::CapabilityDeclaration;
/// use litquery_expr::Operator;
///
/// let decl = CapabilityDeclaration::new("retracted")
///     .allow(Operator::Exists)
///     .scoped("search");
/// assert!(decl.operators.contains(&Operator::Exists));
/// assert!(decl.negatable_operators.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDeclaration {
    /// Field the declaration covers.
    pub field_key: String,
    /// Operation code it is limited to (None = any).
    #[serde(default)]
    pub scope: Option<String>,
    /// Task type it is limited to (None = any).
    #[serde(default)]
    pub task_type: Option<String>,
    /// When the declaration is active.
    #[serde(default)]
    pub effective: EffectiveWindow,
    /// Allowed operators.
    #[serde(default)]
    pub operators: BTreeSet<Operator>,
    /// Operators that may be negated.
    #[serde(default)]
    pub negatable_operators: BTreeSet<Operator>,
    /// TERM constraints.
    #[serde(default)]
    pub term: Option<TermCapability>,
    /// IN constraints.
    #[serde(default, rename = "in")]
    pub in_list: Option<InCapability>,
    /// RANGE constraints.
    #[serde(default)]
    pub range: Option<RangeCapability>,
    /// Whether EXISTS is supported.
    #[serde(default = "yes")]
    pub exists_supported: bool,
    /// TOKEN constraints.
    #[serde(default)]
    pub token: Option<TokenCapability>,
}

impl CapabilityDeclaration {
    /// Creates an unscoped, always-active declaration with no operators.
    pub fn new(field_key: impl Into<String>) -> Self {
        Self {
            field_key: field_key.into(),
            scope: None,
            task_type: None,
            effective: EffectiveWindow::default(),
            operators: BTreeSet::new(),
            negatable_operators: BTreeSet::new(),
            term: None,
            in_list: None,
            range: None,
            exists_supported: true,
            token: None,
        }
    }

    /// Allows an operator.
    pub fn allow(mut self, operator: Operator) -> Self {
        self.operators.insert(operator);
        self
    }

    /// Allows an operator and its negation.
    pub fn allow_negated(mut self, operator: Operator) -> Self {
        self.operators.insert(operator);
        self.negatable_operators.insert(operator);
        self
    }

    /// Limits the declaration to one operation code.
    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Limits the declaration to one task type.
    pub fn for_task(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    /// Sets the effective window.
    pub fn effective(mut self, window: EffectiveWindow) -> Self {
        self.effective = window;
        self
    }

    /// Sets TERM constraints.
    pub fn with_term(mut self, term: TermCapability) -> Self {
        self.term = Some(term);
        self
    }

    /// Sets IN constraints.
    pub fn with_in(mut self, in_list: InCapability) -> Self {
        self.in_list = Some(in_list);
        self
    }

    /// Sets RANGE constraints.
    pub fn with_range(mut self, range: RangeCapability) -> Self {
        self.range = Some(range);
        self
    }

    /// Sets the EXISTS support flag.
    pub fn with_exists(mut self, supported: bool) -> Self {
        self.exists_supported = supported;
        self
    }

    /// Sets TOKEN constraints.
    pub fn with_token(mut self, token: TokenCapability) -> Self {
        self.token = Some(token);
        self
    }

    fn applies_to(&self, scope: &str, task_type: &str, at: DateTime<Utc>) -> bool {
        self.scope.as_deref().map_or(true, |s| s == scope)
            && self.task_type.as_deref().map_or(true, |t| t == task_type)
            && self.effective.contains(at)
    }

    fn specificity(&self) -> u8 {
        u8::from(self.scope.is_some()) + u8::from(self.task_type.is_some())
    }
}

/// All capability declarations of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Declarations in registry order.
    #[serde(default)]
    pub declarations: Vec<CapabilityDeclaration>,
}

impl CapabilitySnapshot {
    /// Creates a snapshot from declarations.
    pub fn new(declarations: Vec<CapabilityDeclaration>) -> Self {
        Self { declarations }
    }

    /// Adds a declaration.
    pub fn declare(mut self, declaration: CapabilityDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Finds the declaration governing `field` at instant `at`.
    ///
    /// Among active candidates the most specific (scope and task type set)
    /// wins; ties go to the latest `effective.from`, then to registry order.
    pub fn resolve(
        &self,
        field: &str,
        scope: &str,
        task_type: &str,
        at: DateTime<Utc>,
    ) -> Option<&CapabilityDeclaration> {
        let mut best: Option<&CapabilityDeclaration> = None;
        for decl in self
            .declarations
            .iter()
            .filter(|d| d.field_key == field && d.applies_to(scope, task_type, at))
        {
            let better = match best {
                None => true,
                Some(current) => {
                    (decl.specificity(), decl.effective.from)
                        > (current.specificity(), current.effective.from)
                }
            };
            if better {
                best = Some(decl);
            }
        }
        best
    }
}
