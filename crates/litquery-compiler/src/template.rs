//! Render rule templates.
//!
//! A template is literal text with `{placeholder}` slots. `{{` and `}}`
//! produce literal braces.
//!
//! | Placeholder | Bound to |
//! |-------------|----------|
//! | `{field}` | the atom's field key |
//! | `{value}` | TERM text, TOKEN value, or the inner fragment of a negation wrapper |
//! | `{quoted}` | `{value}` (or `{item}`) in double quotes |
//! | `{values}` | IN items, rendered and joined |
//! | `{item}` | one IN item (item templates only) |
//! | `{lower}` / `{upper}` | RANGE bounds, or the open marker |
//! | `{lower_bracket}` / `{upper_bracket}` | inclusive/exclusive brackets |
//! | `{kind}` | RANGE kind |
//! | `{expected}` | EXISTS expectation (`true`/`false`) |
//! | `{token_kind}` | TOKEN kind |
//! | `{match_type}` | TERM match type |
//! | `{param:NAME}` | the rule's `params[NAME]` |

use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, value};
use nom::multi::many0;
use nom::sequence::delimited;
use nom::IResult;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::snapshot::SnapshotError;

/// A named slot in a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `{field}`
    Field,
    /// `{value}`
    Value,
    /// `{quoted}`
    Quoted,
    /// `{values}`
    Values,
    /// `{item}`
    Item,
    /// `{lower}`
    Lower,
    /// `{upper}`
    Upper,
    /// `{lower_bracket}`
    LowerBracket,
    /// `{upper_bracket}`
    UpperBracket,
    /// `{kind}`
    Kind,
    /// `{expected}`
    Expected,
    /// `{token_kind}`
    TokenKind,
    /// `{match_type}`
    MatchType,
    /// `{param:NAME}`
    Param(String),
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        let placeholder = match name {
            "field" => Placeholder::Field,
            "value" => Placeholder::Value,
            "quoted" => Placeholder::Quoted,
            "values" => Placeholder::Values,
            "item" => Placeholder::Item,
            "lower" => Placeholder::Lower,
            "upper" => Placeholder::Upper,
            "lower_bracket" => Placeholder::LowerBracket,
            "upper_bracket" => Placeholder::UpperBracket,
            "kind" => Placeholder::Kind,
            "expected" => Placeholder::Expected,
            "token_kind" => Placeholder::TokenKind,
            "match_type" => Placeholder::MatchType,
            other => {
                let param = other.strip_prefix("param:")?;
                if param.is_empty() {
                    return None;
                }
                Placeholder::Param(param.to_string())
            }
        };
        Some(placeholder)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Placeholder::Field => "field",
            Placeholder::Value => "value",
            Placeholder::Quoted => "quoted",
            Placeholder::Values => "values",
            Placeholder::Item => "item",
            Placeholder::Lower => "lower",
            Placeholder::Upper => "upper",
            Placeholder::LowerBracket => "lower_bracket",
            Placeholder::UpperBracket => "upper_bracket",
            Placeholder::Kind => "kind",
            Placeholder::Expected => "expected",
            Placeholder::TokenKind => "token_kind",
            Placeholder::MatchType => "match_type",
            Placeholder::Param(name) => return write!(f, "{{param:{}}}", name),
        };
        write!(f, "{{{}}}", name)
    }
}

/// A parsed template piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied as-is.
    Literal(String),
    /// A slot filled at render time.
    Slot(Placeholder),
}

/// Raw piece before placeholder names are resolved.
#[derive(Debug, Clone)]
enum RawSegment<'a> {
    Literal(&'a str),
    Slot(&'a str),
}

fn is_text(c: char) -> bool {
    c != '{' && c != '}'
}

fn raw_segment(input: &str) -> IResult<&str, RawSegment<'_>> {
    alt((
        value(RawSegment::Literal("{"), tag("{{")),
        value(RawSegment::Literal("}"), tag("}}")),
        map(
            delimited(char('{'), take_while1(is_text), char('}')),
            RawSegment::Slot,
        ),
        map(take_while1(is_text), RawSegment::Literal),
    ))(input)
}

/// A parsed template with its source text.
#[derive(Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template.
    ///
    /// # Example
    ///
    /// ```rust
    /// use litquery_compiler::{Placeholder, Template};
    ///
    /// let template = Template::parse(r#"{field}:"{value}""#).unwrap();
    /// let out = template
    ///     .render(|slot| match slot {
    ///         Placeholder::Field => Some("title".to_string()),
    ///         Placeholder::Value => Some("graphs".to_string()),
    ///         _ => None,
    ///     })
    ///     .unwrap();
    /// assert_eq!(out, r#"title:"graphs""#);
    /// ```
    pub fn parse(source: &str) -> Result<Self, SnapshotError> {
        let invalid = |message: String| SnapshotError::InvalidTemplate {
            template: source.to_string(),
            message,
        };

        let (rest, raw) = many0(raw_segment)(source)
            .map_err(|e| invalid(format!("parse failure: {:?}", e)))?;
        if !rest.is_empty() {
            return Err(invalid(format!(
                "unbalanced brace at offset {}",
                source.len() - rest.len()
            )));
        }

        let mut segments: Vec<Segment> = Vec::with_capacity(raw.len());
        for piece in raw {
            match piece {
                RawSegment::Literal(text) => match segments.last_mut() {
                    Some(Segment::Literal(prev)) => prev.push_str(text),
                    _ => segments.push(Segment::Literal(text.to_string())),
                },
                RawSegment::Slot(name) => {
                    let slot = Placeholder::parse(name.trim())
                        .ok_or_else(|| invalid(format!("unknown placeholder '{{{}}}'", name)))?;
                    segments.push(Segment::Slot(slot));
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Returns the template as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterates over the placeholders used.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Slot(slot) => Some(slot),
            Segment::Literal(_) => None,
        })
    }

    /// Fills every slot through `lookup`.
    ///
    /// Returns the first placeholder `lookup` has no value for.
    pub fn render<F>(&self, lookup: F) -> Result<String, Placeholder>
    where
        F: Fn(&Placeholder) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(slot) => match lookup(slot) {
                    Some(text) => out.push_str(&text),
                    None => return Err(slot.clone()),
                },
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Template").field(&self.source).finish()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Template {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Template::parse(&source).map_err(D::Error::custom)
    }
}
