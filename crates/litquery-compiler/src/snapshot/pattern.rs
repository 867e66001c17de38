//! Anchored regular expressions used by capability declarations.

use std::fmt;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::SnapshotError;

/// A regular expression that must match the whole input.
///
/// Serialized as its source text; compiled once on construction.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern. The source is anchored at both ends.
    pub fn new(source: impl Into<String>) -> Result<Self, SnapshotError> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            SnapshotError::InvalidPattern {
                pattern: source.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(Self { source, regex })
    }

    /// Returns the pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the whole input matches.
    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(source).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_only() {
        let pattern = Pattern::new(r"10\.\d{4,9}/\S+").unwrap();
        assert!(pattern.is_match("10.1000/182"));
        assert!(!pattern.is_match("doi:10.1000/182"));
        assert!(!pattern.is_match("10.1000/182 trailing"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let pattern = Pattern::new("en|zh").unwrap();
        assert!(pattern.is_match("en"));
        assert!(!pattern.is_match("english"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Pattern::new("(unclosed").unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidPattern { .. }));
    }

    #[test]
    fn test_serde_as_source_text() {
        let pattern: Pattern = serde_json::from_str(r#""[a-z]+""#).unwrap();
        assert_eq!(pattern.as_str(), "[a-z]+");
        assert_eq!(serde_json::to_string(&pattern).unwrap(), r#""[a-z]+""#);
        assert!(serde_json::from_str::<Pattern>(r#""[""#).is_err());
    }
}
