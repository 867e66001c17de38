//! Expression tree types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{ExistsValue, InValue, RangeBound, RangeValue, TermValue, TokenValue};

// =============================================================================
// Operators
// =============================================================================

/// Predicate operator of an [`Atom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// Text match.
    Term,
    /// Membership in a list of alternatives.
    In,
    /// Bounded interval.
    Range,
    /// Field presence.
    Exists,
    /// Typed identifier lookup.
    Token,
}

impl Operator {
    /// All operators, in declaration order.
    pub const ALL: [Operator; 5] = [
        Operator::Term,
        Operator::In,
        Operator::Range,
        Operator::Exists,
        Operator::Token,
    ];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Term => "TERM",
            Operator::In => "IN",
            Operator::Range => "RANGE",
            Operator::Exists => "EXISTS",
            Operator::Token => "TOKEN",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Atoms
// =============================================================================

/// Typed value of an atom. The variant determines the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomValue {
    /// `TERM` value.
    Term(TermValue),
    /// `IN` value.
    In(InValue),
    /// `RANGE` value.
    Range(RangeValue),
    /// `EXISTS` value.
    Exists(ExistsValue),
    /// `TOKEN` value.
    Token(TokenValue),
}

impl AtomValue {
    /// Returns the operator this value belongs to.
    pub fn operator(&self) -> Operator {
        match self {
            AtomValue::Term(_) => Operator::Term,
            AtomValue::In(_) => Operator::In,
            AtomValue::Range(_) => Operator::Range,
            AtomValue::Exists(_) => Operator::Exists,
            AtomValue::Token(_) => Operator::Token,
        }
    }

    /// Returns the value-type discriminator used for render rule matching.
    ///
    /// `TEXT` for TERM, `LIST` for IN, the range kind for RANGE,
    /// `PRESENT`/`ABSENT` for EXISTS and the token kind for TOKEN.
    pub fn value_type(&self) -> &str {
        match self {
            AtomValue::Term(_) => "TEXT",
            AtomValue::In(_) => "LIST",
            AtomValue::Range(r) => r.kind.as_str(),
            AtomValue::Exists(e) if e.expected => "PRESENT",
            AtomValue::Exists(_) => "ABSENT",
            AtomValue::Token(t) => &t.kind,
        }
    }
}

/// A leaf predicate: field, operator (implied by the value), value and negation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Provider-agnostic field key (e.g. `title`).
    pub field: String,
    /// Typed value.
    pub value: AtomValue,
    /// Whether the predicate is negated.
    pub negated: bool,
}

impl Atom {
    /// Creates a non-negated atom.
    pub fn new(field: impl Into<String>, value: AtomValue) -> Self {
        Self {
            field: field.into(),
            value,
            negated: false,
        }
    }

    /// Returns the operator.
    pub fn operator(&self) -> Operator {
        self.value.operator()
    }

    /// Flips the negation flag.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Sets the negation flag.
    pub fn with_negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "NOT ")?;
        }
        match &self.value {
            AtomValue::Term(t) => {
                write!(f, "{} TERM({}, {:?}", self.field, t.match_type, t.text)?;
                if t.is_case_sensitive() {
                    write!(f, ", {}", t.case_sensitivity)?;
                }
                write!(f, ")")
            }
            AtomValue::In(v) => write!(f, "{} IN [{}]", self.field, v.values.join(", ")),
            AtomValue::Range(r) => {
                let open = if r.include_lower { '[' } else { '(' };
                let close = if r.include_upper { ']' } else { ')' };
                write!(
                    f,
                    "{} RANGE {}{}{}, {}{}",
                    self.field,
                    r.kind,
                    open,
                    bound_text(&r.lower),
                    bound_text(&r.upper),
                    close
                )
            }
            AtomValue::Exists(e) if e.expected => write!(f, "{} EXISTS", self.field),
            AtomValue::Exists(_) => write!(f, "{} EXISTS(false)", self.field),
            AtomValue::Token(t) => write!(f, "{} TOKEN({}:{})", self.field, t.kind, t.value),
        }
    }
}

fn bound_text(bound: &Option<RangeBound>) -> String {
    bound
        .as_ref()
        .map(RangeBound::canonical)
        .unwrap_or_else(|| "*".to_string())
}

// =============================================================================
// Expressions
// =============================================================================

/// Immutable boolean expression tree.
///
/// Sub-trees are reference-counted, so cloning is cheap and normalized trees
/// share unchanged nodes with their input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Literal true/false.
    Const(bool),
    /// Leaf predicate.
    Atom(Arc<Atom>),
    /// Conjunction of all children.
    And(Arc<[Expr]>),
    /// Disjunction of all children.
    Or(Arc<[Expr]>),
    /// Negation of a sub-tree.
    Not(Arc<Expr>),
}

impl Expr {
    /// The `true` constant.
    pub fn truth() -> Self {
        Expr::Const(true)
    }

    /// The `false` constant.
    pub fn falsity() -> Self {
        Expr::Const(false)
    }

    /// Wraps an atom.
    pub fn atom(atom: Atom) -> Self {
        Expr::Atom(Arc::new(atom))
    }

    /// Builds a conjunction. Children are kept as given; see
    /// [`normalize`](crate::normalize) for folding.
    pub fn and<I: IntoIterator<Item = Expr>>(children: I) -> Self {
        Expr::And(children.into_iter().collect())
    }

    /// Builds a disjunction. Children are kept as given.
    pub fn or<I: IntoIterator<Item = Expr>>(children: I) -> Self {
        Expr::Or(children.into_iter().collect())
    }

    /// Negates a sub-tree.
    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Expr) -> Self {
        Expr::Not(Arc::new(child))
    }

    /// Returns the constant value if this is a `Const`.
    pub fn as_const(&self) -> Option<bool> {
        match self {
            Expr::Const(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the node type name used on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Const(_) => "const",
            Expr::Atom(_) => "atom",
            Expr::And(_) => "and",
            Expr::Or(_) => "or",
            Expr::Not(_) => "not",
        }
    }

    /// Returns all atoms in depth-first order.
    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Atom>) {
        match self {
            Expr::Const(_) => {}
            Expr::Atom(a) => out.push(a),
            Expr::And(children) | Expr::Or(children) => {
                for child in children.iter() {
                    child.collect_atoms(out);
                }
            }
            Expr::Not(child) => child.collect_atoms(out),
        }
    }

    /// Returns the total number of nodes.
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Atom(_) => 1,
            Expr::And(children) | Expr::Or(children) => {
                1 + children.iter().map(Expr::node_count).sum::<usize>()
            }
            Expr::Not(child) => 1 + child.node_count(),
        }
    }
}

impl From<Atom> for Expr {
    fn from(atom: Atom) -> Self {
        Expr::atom(atom)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Const(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(true) => write!(f, "TRUE"),
            Expr::Const(false) => write!(f, "FALSE"),
            Expr::Atom(a) => write!(f, "{}", a),
            Expr::And(children) => write_group(f, children, " AND "),
            Expr::Or(children) => write_group(f, children, " OR "),
            Expr::Not(child) => write!(f, "NOT {}", child),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, children: &[Expr], joiner: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(joiner)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}
