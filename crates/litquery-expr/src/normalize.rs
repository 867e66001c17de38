//! Structural simplification of expression trees.
//!
//! [`normalize`] rewrites a tree bottom-up:
//!
//! - constant folding (`AND` drops `true` and collapses on `false`, `OR` the reverse)
//! - flattening of nested same-kind groups (`AND(AND(a, b), c)` → `AND(a, b, c)`)
//! - double-negation elimination and `NOT(const)` folding
//! - `NOT(atom)` folds into the atom's `negated` flag
//! - groups left with one child collapse to that child; empty ones become
//!   their identity constant
//!
//! The output is `Const(true)`, `Const(false)`, or a tree containing at least
//! one atom and no constants. The input is never modified; unchanged
//! sub-trees are shared with the output.

use std::sync::Arc;

use crate::ast::Expr;
use crate::error::{ExprError, ExprResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    And,
    Or,
}

impl GroupKind {
    /// Neutral element: dropped from the group.
    fn identity(self) -> bool {
        matches!(self, GroupKind::And)
    }

    fn name(self) -> &'static str {
        match self {
            GroupKind::And => "AND",
            GroupKind::Or => "OR",
        }
    }

    fn build(self, children: Vec<Expr>) -> Expr {
        match self {
            GroupKind::And => Expr::and(children),
            GroupKind::Or => Expr::or(children),
        }
    }
}

/// Normalizes an expression.
///
/// With `strict = false`, empty and single-child groups in the input are
/// collapsed silently. With `strict = true` they are rejected as
/// [`ExprError::Malformed`]. Groups that shrink because of constant folding
/// always collapse, in both modes.
///
/// # Example
///
/// ```rust
/// use litquery_expr::{normalize, Expr};
///
/// let expr = Expr::or([Expr::truth(), Expr::falsity()]);
/// assert_eq!(normalize(&expr, false).unwrap(), Expr::truth());
/// ```
pub fn normalize(expr: &Expr, strict: bool) -> ExprResult<Expr> {
    normalize_at(expr, strict, "$")
}

fn normalize_at(expr: &Expr, strict: bool, path: &str) -> ExprResult<Expr> {
    match expr {
        Expr::Const(_) | Expr::Atom(_) => Ok(expr.clone()),
        Expr::Not(child) => {
            let inner = normalize_at(child, strict, &format!("{}.child", path))?;
            Ok(negate(inner))
        }
        Expr::And(children) => normalize_group(GroupKind::And, children, strict, path),
        Expr::Or(children) => normalize_group(GroupKind::Or, children, strict, path),
    }
}

/// Negates an already-normalized expression.
fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Const(b) => Expr::Const(!b),
        Expr::Not(inner) => Arc::unwrap_or_clone(inner),
        Expr::Atom(atom) => Expr::atom(Arc::unwrap_or_clone(atom).negate()),
        group => Expr::not(group),
    }
}

fn normalize_group(
    kind: GroupKind,
    children: &[Expr],
    strict: bool,
    path: &str,
) -> ExprResult<Expr> {
    if strict && children.len() < 2 {
        return Err(ExprError::malformed(
            path,
            format!(
                "{} group with {} child(ren) is ambiguous in strict mode",
                kind.name(),
                children.len()
            ),
        ));
    }

    let identity = kind.identity();
    let mut flat = Vec::with_capacity(children.len());
    for (i, child) in children.iter().enumerate() {
        let child = normalize_at(child, strict, &format!("{}.children[{}]", path, i))?;
        match child {
            Expr::Const(b) if b == identity => {}
            Expr::Const(absorbing) => return Ok(Expr::Const(absorbing)),
            Expr::And(grandchildren) if kind == GroupKind::And => {
                flat.extend(grandchildren.iter().cloned())
            }
            Expr::Or(grandchildren) if kind == GroupKind::Or => {
                flat.extend(grandchildren.iter().cloned())
            }
            other => flat.push(other),
        }
    }

    Ok(match flat.len() {
        0 => Expr::Const(identity),
        1 => flat.swap_remove(0),
        _ => kind.build(flat),
    })
}
