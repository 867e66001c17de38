//! # litquery-expr
//!
//! Provider-agnostic expression model for literature-metadata queries.
//!
//! This crate provides:
//! - **Expression model**: an immutable boolean tree over typed atoms
//!   (`TERM`, `IN`, `RANGE`, `EXISTS`, `TOKEN`)
//! - **JSON codec**: a lossless wire format with fixed key order
//! - **Canonicalizer**: canonical JSON plus a SHA-256 content hash
//! - **Normalizer**: constant folding, flattening and negation cleanup
//!
//! ## Usage
//!
//! ```rust
//! use litquery_expr::builder::{any_of, phrase};
//! use litquery_expr::{canonicalize, from_json, normalize, to_json, Expr};
//!
//! let expr = Expr::and([
//!     Expr::from(phrase("title", "deep learning")),
//!     Expr::from(any_of("lang", ["en", "zh"])),
//!     Expr::truth(),
//! ]);
//!
//! // Fold constants before hashing so equivalent inputs share a key
//! let normalized = normalize(&expr, false).unwrap();
//! assert_eq!(normalized.atoms().len(), 2);
//!
//! // Lossless round trip
//! let json = to_json(&normalized).unwrap();
//! assert_eq!(from_json(&json).unwrap(), normalized);
//!
//! // Content hash for idempotency
//! let form = canonicalize(&normalized).unwrap();
//! assert_eq!(form.canonical_json, json);
//! ```
//!
//! ## Node Types
//!
//! | Node | Meaning | Wire tag |
//! |------|---------|----------|
//! | `Const(b)` | Literal true/false | `const` |
//! | `Atom` | Leaf predicate | `atom` |
//! | `And(children)` | All children hold | `and` |
//! | `Or(children)` | Any child holds | `or` |
//! | `Not(child)` | Child does not hold | `not` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
pub mod builder;
mod canonical;
mod codec;
mod error;
mod normalize;
pub mod value;

pub use ast::{Atom, AtomValue, Expr, Operator};
pub use canonical::{canonical_hash, canonicalize, sha256_hex, CanonicalForm};
pub use codec::{from_json, from_value, to_json, to_json_pretty};
pub use error::{ExprError, ExprResult};
pub use normalize::normalize;
pub use value::{
    CaseSensitivity, DateTimeValue, ExistsValue, InValue, MatchType, Number, RangeBound,
    RangeKind, RangeValue, TermValue, TokenValue,
};
