//! Convenience constructors for atoms.
//!
//! Each function returns an [`Atom`] so it can be negated before being
//! wrapped into an [`Expr`]:
//!
//! ```rust
//! use litquery_expr::builder::{any_of, exists, phrase};
//! use litquery_expr::Expr;
//!
//! let expr = Expr::and([
//!     Expr::from(phrase("title", "deep learning")),
//!     Expr::from(any_of("lang", ["en", "zh"])),
//!     Expr::from(exists("retracted").negate()),
//! ]);
//! assert_eq!(expr.atoms().len(), 3);
//! ```

use chrono::NaiveDate;

use crate::ast::{Atom, AtomValue};
use crate::value::{
    DateTimeValue, ExistsValue, InValue, MatchType, Number, RangeValue, TermValue, TokenValue,
};

/// TERM atom with the given match type.
pub fn term(field: impl Into<String>, text: impl Into<String>, match_type: MatchType) -> Atom {
    Atom::new(field, AtomValue::Term(TermValue::new(text, match_type)))
}

/// TERM atom matching a phrase.
pub fn phrase(field: impl Into<String>, text: impl Into<String>) -> Atom {
    term(field, text, MatchType::Phrase)
}

/// TERM atom matching the whole value.
pub fn exact(field: impl Into<String>, text: impl Into<String>) -> Atom {
    term(field, text, MatchType::Exact)
}

/// IN atom over the given alternatives.
pub fn any_of<I, S>(field: impl Into<String>, values: I) -> Atom
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Atom::new(field, AtomValue::In(InValue::new(values)))
}

/// Inclusive DATE range atom.
pub fn date_range(
    field: impl Into<String>,
    lower: Option<NaiveDate>,
    upper: Option<NaiveDate>,
) -> Atom {
    Atom::new(field, AtomValue::Range(RangeValue::dates(lower, upper)))
}

/// Inclusive DATETIME range atom.
pub fn datetime_range(
    field: impl Into<String>,
    lower: Option<DateTimeValue>,
    upper: Option<DateTimeValue>,
) -> Atom {
    Atom::new(field, AtomValue::Range(RangeValue::datetimes(lower, upper)))
}

/// Inclusive NUMBER range atom.
pub fn number_range(field: impl Into<String>, lower: Option<Number>, upper: Option<Number>) -> Atom {
    Atom::new(field, AtomValue::Range(RangeValue::numbers(lower, upper)))
}

/// Arbitrary RANGE atom.
pub fn range(field: impl Into<String>, value: RangeValue) -> Atom {
    Atom::new(field, AtomValue::Range(value))
}

/// EXISTS atom requiring the field to be present.
pub fn exists(field: impl Into<String>) -> Atom {
    Atom::new(field, AtomValue::Exists(ExistsValue::new(true)))
}

/// EXISTS atom requiring the field to be absent.
pub fn missing(field: impl Into<String>) -> Atom {
    Atom::new(field, AtomValue::Exists(ExistsValue::new(false)))
}

/// TOKEN atom.
pub fn token(field: impl Into<String>, kind: impl Into<String>, value: impl Into<String>) -> Atom {
    Atom::new(field, AtomValue::Token(TokenValue::new(kind, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operator;
    use crate::value::RangeKind;

    #[test]
    fn test_builders_set_operator() {
        assert_eq!(phrase("title", "x").operator(), Operator::Term);
        assert_eq!(any_of("lang", ["en"]).operator(), Operator::In);
        assert_eq!(date_range("d", None, None).operator(), Operator::Range);
        assert_eq!(exists("oa").operator(), Operator::Exists);
        assert_eq!(token("id", "doi", "10.1/x").operator(), Operator::Token);
    }

    #[test]
    fn test_missing_is_exists_false() {
        match missing("doi").value {
            AtomValue::Exists(e) => assert!(!e.expected),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_number_range_kind() {
        let atom = number_range("citations", Number::new(10.0), None);
        match atom.value {
            AtomValue::Range(r) => {
                assert_eq!(r.kind, RangeKind::Number);
                assert!(r.is_open_end());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
