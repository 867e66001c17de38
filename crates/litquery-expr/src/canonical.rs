//! Canonical serialization and content hashing.
//!
//! The canonical form is the compact wire form produced by [`to_json`]; the
//! hash is the hex-encoded SHA-256 of its UTF-8 bytes.
//!
//! ## Determinism Guarantees
//!
//! - Structurally equal trees → same canonical JSON → same hash
//! - Child order is significant: `AND[a, b]` and `AND[b, a]` hash differently
//! - No semantic rewriting happens here; run [`normalize`](crate::normalize)
//!   first when constant folding or flattening should not affect the hash

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::ast::Expr;
use crate::codec::to_json;
use crate::error::ExprResult;

/// Canonical text and content hash of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalForm {
    /// Compact wire-form JSON.
    pub canonical_json: String,
    /// Hex-encoded SHA-256 of `canonical_json` (64 characters).
    pub hash: String,
}

/// Computes the canonical form and hash of an expression.
///
/// # Example
///
/// ```rust
/// use litquery_expr::{canonicalize, Expr};
///
/// let a = canonicalize(&Expr::truth()).unwrap();
/// let b = canonicalize(&Expr::truth()).unwrap();
/// assert_eq!(a.hash, b.hash);
/// assert_eq!(a.hash.len(), 64);
/// ```
pub fn canonicalize(expr: &Expr) -> ExprResult<CanonicalForm> {
    let canonical_json = to_json(expr)?;
    let hash = sha256_hex(canonical_json.as_bytes());
    Ok(CanonicalForm {
        canonical_json,
        hash,
    })
}

/// Computes only the content hash of an expression.
pub fn canonical_hash(expr: &Expr) -> ExprResult<String> {
    canonicalize(expr).map(|form| form.hash)
}

/// Hex-encoded SHA-256 of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Atom, AtomValue};
    use crate::value::{ExistsValue, InValue};

    fn lang() -> Expr {
        Expr::atom(Atom::new("lang", AtomValue::In(InValue::new(["en"]))))
    }

    fn retracted() -> Expr {
        Expr::atom(Atom::new("retracted", AtomValue::Exists(ExistsValue::new(true))))
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_matches_canonical_json() {
        let form = canonicalize(&lang()).unwrap();
        assert_eq!(form.hash, sha256_hex(form.canonical_json.as_bytes()));
    }

    #[test]
    fn test_independently_built_trees_share_hash() {
        let a = Expr::and([lang(), retracted()]);
        let b = Expr::and(vec![lang(), retracted()]);
        assert_eq!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }

    #[test]
    fn test_child_order_changes_hash() {
        let ab = Expr::and([lang(), retracted()]);
        let ba = Expr::and([retracted(), lang()]);
        assert_ne!(canonical_hash(&ab).unwrap(), canonical_hash(&ba).unwrap());
    }

    #[test]
    fn test_no_semantic_folding() {
        let folded = lang();
        let unfolded = Expr::and([Expr::truth(), lang()]);
        assert_ne!(
            canonical_hash(&folded).unwrap(),
            canonical_hash(&unfolded).unwrap()
        );
    }
}
