//! Atomic value types carried by atom predicates.
//!
//! Each operator has exactly one value shape:
//!
//! | Operator | Value | Example |
//! |----------|-------|---------|
//! | `TERM` | [`TermValue`] | `"deep learning"` as a phrase |
//! | `IN` | [`InValue`] | `["en", "zh"]` |
//! | `RANGE` | [`RangeValue`] | `[2024-01-01, 2024-12-31]` |
//! | `EXISTS` | [`ExistsValue`] | field present |
//! | `TOKEN` | [`TokenValue`] | `doi:10.1000/182` |

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ExprError, ExprResult};

/// `chrono` format of DATE values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `chrono` format of DATETIME values without offset.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// =============================================================================
// Keywords
// =============================================================================

/// How a TERM text is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    /// Words must appear adjacent and in order.
    Phrase,
    /// The whole field value must equal the text.
    Exact,
    /// Any of the words may match.
    Any,
}

impl MatchType {
    /// All match types, in declaration order.
    pub const ALL: [MatchType; 3] = [MatchType::Phrase, MatchType::Exact, MatchType::Any];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Phrase => "PHRASE",
            MatchType::Exact => "EXACT",
            MatchType::Any => "ANY",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case handling requested for a TERM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseSensitivity {
    /// Case must match.
    Sensitive,
    /// Case is ignored.
    Insensitive,
}

impl CaseSensitivity {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseSensitivity::Sensitive => "SENSITIVE",
            CaseSensitivity::Insensitive => "INSENSITIVE",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "SENSITIVE" => Some(CaseSensitivity::Sensitive),
            "INSENSITIVE" => Some(CaseSensitivity::Insensitive),
            _ => None,
        }
    }
}

impl fmt::Display for CaseSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The domain of a RANGE predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RangeKind {
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Date and time, optionally with an offset.
    DateTime,
    /// Finite decimal number.
    Number,
}

impl RangeKind {
    /// All range kinds, in declaration order.
    pub const ALL: [RangeKind; 3] = [RangeKind::Date, RangeKind::DateTime, RangeKind::Number];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeKind::Date => "DATE",
            RangeKind::DateTime => "DATETIME",
            RangeKind::Number => "NUMBER",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Scalars
// =============================================================================

/// A finite decimal number.
///
/// The canonical text form never uses an exponent and always carries a
/// decimal point: `2024.0`, `0.5`, `-3.25`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Number(f64);

impl Number {
    /// Creates a number; returns `None` for NaN and infinities.
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // Collapse -0.0 so equal values share one canonical form.
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    /// Parses decimal text.
    pub fn parse(input: &str) -> Option<Self> {
        input.trim().parse::<f64>().ok().and_then(Self::new)
    }

    /// Returns the underlying value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Returns the canonical text form.
    pub fn canonical(&self) -> String {
        let text = self.0.to_string();
        if text.contains('.') {
            text
        } else {
            format!("{}.0", text)
        }
    }
}

impl Eq for Number {}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A date-time literal, optionally carrying its UTC offset.
///
/// Literals without an offset are "naive" and are interpreted in the
/// timezone configured at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTimeValue {
    /// Wall-clock time (local to `offset` when present).
    pub local: NaiveDateTime,
    /// UTC offset of `local`, if known.
    pub offset: Option<FixedOffset>,
}

impl DateTimeValue {
    /// Creates a naive date-time.
    pub fn naive(local: NaiveDateTime) -> Self {
        Self {
            local,
            offset: None,
        }
    }

    /// Creates a date-time in a fixed offset.
    pub fn with_offset(local: NaiveDateTime, offset: FixedOffset) -> Self {
        Self {
            local,
            offset: Some(offset),
        }
    }

    /// Creates a date-time from a UTC instant.
    pub fn from_utc(instant: DateTime<Utc>) -> Self {
        Self::with_offset(instant.naive_utc(), Utc.fix())
    }

    /// Parses ISO-8601 text, with or without offset.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(Self::with_offset(dt.naive_local(), *dt.offset()));
        }
        NaiveDateTime::parse_from_str(input, DATETIME_FORMAT)
            .ok()
            .map(Self::naive)
    }

    /// Returns the canonical ISO-8601 text.
    pub fn canonical(&self) -> String {
        let base = self.local.format(DATETIME_FORMAT).to_string();
        match self.offset {
            Some(offset) => format!("{}{}", base, offset),
            None => base,
        }
    }

    /// Resolves to a UTC instant, using `assumed` for naive values.
    pub fn to_utc(&self, assumed: FixedOffset) -> Option<DateTime<Utc>> {
        self.offset
            .unwrap_or(assumed)
            .from_local_datetime(&self.local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// One end of a RANGE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    /// A calendar date.
    Date(NaiveDate),
    /// A date-time.
    DateTime(DateTimeValue),
    /// A number.
    Number(Number),
}

impl RangeBound {
    /// Returns the range kind this bound belongs to.
    pub fn kind(&self) -> RangeKind {
        match self {
            RangeBound::Date(_) => RangeKind::Date,
            RangeBound::DateTime(_) => RangeKind::DateTime,
            RangeBound::Number(_) => RangeKind::Number,
        }
    }

    /// Parses a bound for the given kind.
    pub fn parse(kind: RangeKind, input: &str) -> ExprResult<Self> {
        let parsed = match kind {
            RangeKind::Date => NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
                .ok()
                .map(RangeBound::Date),
            RangeKind::DateTime => DateTimeValue::parse(input).map(RangeBound::DateTime),
            RangeKind::Number => Number::parse(input).map(RangeBound::Number),
        };
        parsed.ok_or_else(|| ExprError::InvalidBound {
            kind: kind.as_str().to_string(),
            input: input.to_string(),
        })
    }

    /// Returns the canonical text form.
    pub fn canonical(&self) -> String {
        match self {
            RangeBound::Date(d) => d.format(DATE_FORMAT).to_string(),
            RangeBound::DateTime(dt) => dt.canonical(),
            RangeBound::Number(n) => n.canonical(),
        }
    }

    /// Orders two bounds of the same kind.
    ///
    /// Naive date-times compare as UTC. Returns `None` across kinds.
    pub fn compare(&self, other: &RangeBound) -> Option<Ordering> {
        match (self, other) {
            (RangeBound::Date(a), RangeBound::Date(b)) => Some(a.cmp(b)),
            (RangeBound::Number(a), RangeBound::Number(b)) => a.partial_cmp(b),
            (RangeBound::DateTime(a), RangeBound::DateTime(b)) => {
                let utc = Utc.fix();
                Some(a.to_utc(utc)?.cmp(&b.to_utc(utc)?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl Serialize for RangeBound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

// =============================================================================
// Operator values
// =============================================================================

/// Value of a TERM predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermValue {
    /// Text to match.
    pub text: String,
    /// How the text is matched.
    pub match_type: MatchType,
    /// Requested case handling.
    pub case_sensitivity: CaseSensitivity,
}

impl TermValue {
    /// Creates a case-insensitive term.
    pub fn new(text: impl Into<String>, match_type: MatchType) -> Self {
        Self {
            text: text.into(),
            match_type,
            case_sensitivity: CaseSensitivity::Insensitive,
        }
    }

    /// Requests case-sensitive matching.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitivity = CaseSensitivity::Sensitive;
        self
    }

    /// Returns true if case-sensitive matching is requested.
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitivity == CaseSensitivity::Sensitive
    }

    /// Returns true if the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Value of an IN predicate: an ordered list of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InValue {
    /// Alternatives in caller order (duplicates preserved).
    pub values: Vec<String>,
    /// Whether alternatives compare case-sensitively.
    pub case_sensitive: bool,
}

impl InValue {
    /// Creates a case-insensitive list.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            case_sensitive: false,
        }
    }

    /// Requests case-sensitive comparison.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Returns the alternatives with duplicates removed, keeping first occurrences.
    ///
    /// Duplicates are detected case-insensitively unless the list is case-sensitive.
    pub fn distinct_values(&self) -> Vec<&str> {
        let mut seen: Vec<String> = Vec::with_capacity(self.values.len());
        let mut distinct = Vec::with_capacity(self.values.len());
        for value in &self.values {
            let key = if self.case_sensitive {
                value.clone()
            } else {
                value.to_lowercase()
            };
            if !seen.contains(&key) {
                seen.push(key);
                distinct.push(value.as_str());
            }
        }
        distinct
    }

    /// Returns true if any alternative repeats.
    pub fn has_duplicates(&self) -> bool {
        self.distinct_values().len() != self.values.len()
    }
}

/// Value of a RANGE predicate. Either bound may be open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeValue {
    /// Domain of the bounds.
    pub kind: RangeKind,
    /// Lower bound (`None` = open start).
    pub lower: Option<RangeBound>,
    /// Upper bound (`None` = open end).
    pub upper: Option<RangeBound>,
    /// Whether the lower bound is inclusive.
    pub include_lower: bool,
    /// Whether the upper bound is inclusive.
    pub include_upper: bool,
}

impl RangeValue {
    /// Creates an inclusive range.
    pub fn new(kind: RangeKind, lower: Option<RangeBound>, upper: Option<RangeBound>) -> Self {
        Self {
            kind,
            lower,
            upper,
            include_lower: true,
            include_upper: true,
        }
    }

    /// Creates an inclusive date range.
    pub fn dates(lower: Option<NaiveDate>, upper: Option<NaiveDate>) -> Self {
        Self::new(
            RangeKind::Date,
            lower.map(RangeBound::Date),
            upper.map(RangeBound::Date),
        )
    }

    /// Creates an inclusive date-time range.
    pub fn datetimes(lower: Option<DateTimeValue>, upper: Option<DateTimeValue>) -> Self {
        Self::new(
            RangeKind::DateTime,
            lower.map(RangeBound::DateTime),
            upper.map(RangeBound::DateTime),
        )
    }

    /// Creates an inclusive number range.
    pub fn numbers(lower: Option<Number>, upper: Option<Number>) -> Self {
        Self::new(
            RangeKind::Number,
            lower.map(RangeBound::Number),
            upper.map(RangeBound::Number),
        )
    }

    /// Makes the lower bound exclusive.
    pub fn exclusive_lower(mut self) -> Self {
        self.include_lower = false;
        self
    }

    /// Makes the upper bound exclusive.
    pub fn exclusive_upper(mut self) -> Self {
        self.include_upper = false;
        self
    }

    /// Returns true if the range has no lower bound.
    pub fn is_open_start(&self) -> bool {
        self.lower.is_none()
    }

    /// Returns true if the range has no upper bound.
    pub fn is_open_end(&self) -> bool {
        self.upper.is_none()
    }

    /// Returns true if no value can satisfy both bounds.
    pub fn is_inverted(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.compare(upper) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => !(self.include_lower && self.include_upper),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Value of an EXISTS predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExistsValue {
    /// `true` = field must be present, `false` = field must be absent.
    pub expected: bool,
}

impl ExistsValue {
    /// Creates an EXISTS value.
    pub fn new(expected: bool) -> Self {
        Self { expected }
    }
}

/// Value of a TOKEN predicate: a typed opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenValue {
    /// Token kind (e.g. `doi`, `issn`).
    pub kind: String,
    /// Token text.
    pub value: String,
}

impl TokenValue {
    /// Creates a token value.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_keyword_round_trip() {
        for m in MatchType::ALL {
            assert_eq!(MatchType::parse(m.as_str()), Some(m));
        }
        for k in RangeKind::ALL {
            assert_eq!(RangeKind::parse(k.as_str()), Some(k));
        }
        assert_eq!(RangeKind::DateTime.as_str(), "DATETIME");
        assert_eq!(MatchType::parse("phrase"), None);
    }

    #[test]
    fn test_number_canonical_form() {
        assert_eq!(Number::new(2024.0).unwrap().canonical(), "2024.0");
        assert_eq!(Number::new(0.5).unwrap().canonical(), "0.5");
        assert_eq!(Number::new(-0.0).unwrap().canonical(), "0.0");
        assert_eq!(
            Number::new(1e21).unwrap().canonical(),
            "1000000000000000000000.0"
        );
        assert!(!Number::new(1e-7).unwrap().canonical().contains('e'));
    }

    #[test]
    fn test_number_rejects_non_finite() {
        assert!(Number::new(f64::NAN).is_none());
        assert!(Number::new(f64::INFINITY).is_none());
        assert!(Number::parse("inf").is_none());
        assert!(Number::parse("abc").is_none());
    }

    #[test]
    fn test_datetime_parse_forms() {
        let naive = DateTimeValue::parse("2024-03-01T10:15:00").unwrap();
        assert!(naive.offset.is_none());
        assert_eq!(naive.canonical(), "2024-03-01T10:15:00");

        let zulu = DateTimeValue::parse("2024-03-01T10:15:00Z").unwrap();
        assert_eq!(zulu.canonical(), "2024-03-01T10:15:00+00:00");

        let offset = DateTimeValue::parse("2024-03-01T10:15:00.250+08:00").unwrap();
        assert_eq!(offset.canonical(), "2024-03-01T10:15:00.250+08:00");
    }

    #[test]
    fn test_datetime_to_utc() {
        let value = DateTimeValue::parse("2024-03-01T10:00:00+02:00").unwrap();
        let utc = value.to_utc(Utc.fix()).unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-03-01T08:00:00+00:00");

        let naive = DateTimeValue::parse("2024-03-01T10:00:00").unwrap();
        let assumed = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            naive.to_utc(assumed).unwrap().to_rfc3339(),
            "2024-03-01T09:00:00+00:00"
        );
    }

    #[test]
    fn test_bound_parse_per_kind() {
        assert_eq!(
            RangeBound::parse(RangeKind::Date, "2024-01-01").unwrap(),
            RangeBound::Date(date(2024, 1, 1))
        );
        assert!(RangeBound::parse(RangeKind::Date, "2024-01-01T00:00:00").is_err());
        assert!(RangeBound::parse(RangeKind::Number, "12.5").is_ok());
        assert!(RangeBound::parse(RangeKind::Number, "2024-01-01").is_err());
    }

    #[test]
    fn test_bound_compare() {
        let a = RangeBound::Date(date(2024, 1, 1));
        let b = RangeBound::Date(date(2024, 12, 31));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        let n = RangeBound::Number(Number::new(1.0).unwrap());
        assert_eq!(a.compare(&n), None);
    }

    #[test]
    fn test_range_inverted() {
        let ok = RangeValue::dates(Some(date(2024, 1, 1)), Some(date(2024, 12, 31)));
        assert!(!ok.is_inverted());
        let inverted = RangeValue::dates(Some(date(2025, 1, 1)), Some(date(2024, 1, 1)));
        assert!(inverted.is_inverted());
        let empty = RangeValue::dates(Some(date(2024, 1, 1)), Some(date(2024, 1, 1))).exclusive_upper();
        assert!(empty.is_inverted());
        let open = RangeValue::dates(None, Some(date(2024, 1, 1)));
        assert!(open.is_open_start());
        assert!(!open.is_inverted());
    }

    #[test]
    fn test_in_distinct_values() {
        let value = InValue::new(["en", "EN", "zh", "en"]);
        assert_eq!(value.distinct_values(), vec!["en", "zh"]);
        assert!(value.has_duplicates());

        let sensitive = InValue::new(["en", "EN"]).case_sensitive();
        assert_eq!(sensitive.distinct_values(), vec!["en", "EN"]);
        assert!(!sensitive.has_duplicates());
    }

    #[test]
    fn test_term_blank() {
        assert!(TermValue::new("   ", MatchType::Any).is_blank());
        assert!(!TermValue::new("x", MatchType::Any).is_blank());
        assert!(TermValue::new("x", MatchType::Exact).case_sensitive().is_case_sensitive());
    }
}
