//! Immutable provider snapshots: capability declarations and render rules.
//!
//! A [`ProvenanceSnapshot`] is one registry read for a
//! (provenance, task type, operation) triple, captured at a fixed instant.
//! Every compile stage receives the same snapshot, so compiles never observe
//! a half-updated registry.
//!
//! # Document Format
//!
//! ```json
//! {
//!   "provenance_id": 7,
//!   "code": "crossref",
//!   "task_type": "harvest",
//!   "operation": "search",
//!   "version": 12,
//!   "captured_at": "2024-06-01T00:00:00Z",
//!   "capabilities": { "declarations": [ ... ] },
//!   "render_rules": { "dialect": { ... }, "rules": [ ... ] }
//! }
//! ```
//!
//! [`ProvenanceSnapshot::from_json`] parses and validates in one step.

mod capability;
mod pattern;
mod render;

pub use capability::{
    BoundsEnforcement, CapabilityDeclaration, CapabilitySnapshot, InCapability, RangeCapability,
    TermCapability, TokenCapability,
};
pub use pattern::Pattern;
pub use render::{EmitTarget, RenderDialect, RenderRule, RenderRuleSnapshot, Transform};

use std::collections::HashSet;
use std::fmt;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use litquery_expr::RangeKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::SnapshotKey;

/// Errors in snapshot documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A pattern does not compile.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Pattern source.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// A template does not parse.
    #[error("invalid template '{template}': {message}")]
    InvalidTemplate {
        /// Template source.
        template: String,
        /// Parser message.
        message: String,
    },

    /// A range limit does not parse under its declared kind.
    #[error("invalid {kind} range limit '{input}'")]
    InvalidBound {
        /// Declared kind.
        kind: RangeKind,
        /// Rejected text.
        input: String,
    },

    /// A date format parameter is not a valid strftime string.
    #[error("invalid date format '{0}'")]
    InvalidFormat(String),

    /// An effective window ends before it starts.
    #[error("empty effective window in {0}")]
    EmptyWindow(String),

    /// A parameter-emitting rule has no parameter name.
    #[error("render rule '{0}' emits parameters but has no param_key")]
    MissingParamKey(String),

    /// Two rules share an id.
    #[error("duplicate render rule id '{0}'")]
    DuplicateRule(String),

    /// The document is not valid JSON for a snapshot.
    #[error("snapshot document could not be parsed: {0}")]
    Parse(String),
}

/// A half-open activity window `[from, to)`. Missing ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectiveWindow {
    /// First active instant.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// First inactive instant.
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl EffectiveWindow {
    /// Always active.
    pub fn always() -> Self {
        Self::default()
    }

    /// Active from `from` on.
    pub fn starting(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// Active in `[from, to)`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns true if `at` lies inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| from <= at) && self.to.map_or(true, |to| at < to)
    }

    /// Returns true if no instant lies inside the window.
    pub fn is_empty(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if to <= from)
    }
}

/// Reference to the snapshot a result was compiled against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotRef {
    /// Numeric provenance id.
    pub provenance_id: u64,
    /// Provenance code.
    pub code: String,
    /// Operation code.
    pub operation: String,
    /// Registry version.
    pub version: u64,
    /// Capture instant.
    pub captured_at: DateTime<Utc>,
}

impl fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}@v{}",
            self.code, self.provenance_id, self.operation, self.version
        )
    }
}

/// One immutable registry read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceSnapshot {
    /// Numeric provenance id.
    pub provenance_id: u64,
    /// Provenance code.
    pub code: String,
    /// Task type.
    pub task_type: String,
    /// Operation code; capability and rule `scope` match against it.
    pub operation: String,
    /// Registry version.
    pub version: u64,
    /// Instant at which declarations and rules are evaluated.
    pub captured_at: DateTime<Utc>,
    /// Capability declarations.
    #[serde(default)]
    pub capabilities: CapabilitySnapshot,
    /// Dialect and render rules.
    #[serde(default)]
    pub render_rules: RenderRuleSnapshot,
}

impl ProvenanceSnapshot {
    /// Creates an empty snapshot.
    pub fn new(
        provenance_id: u64,
        code: impl Into<String>,
        task_type: impl Into<String>,
        operation: impl Into<String>,
        version: u64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provenance_id,
            code: code.into(),
            task_type: task_type.into(),
            operation: operation.into(),
            version,
            captured_at,
            capabilities: CapabilitySnapshot::default(),
            render_rules: RenderRuleSnapshot::default(),
        }
    }

    /// Sets the capability declarations.
    pub fn with_capabilities(mut self, capabilities: CapabilitySnapshot) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the dialect and render rules.
    pub fn with_render_rules(mut self, render_rules: RenderRuleSnapshot) -> Self {
        self.render_rules = render_rules;
        self
    }

    /// Returns the cache/source key of this snapshot.
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(&self.code, &self.task_type, &self.operation)
    }

    /// Returns the reference recorded in compile results.
    pub fn snapshot_ref(&self) -> SnapshotRef {
        SnapshotRef {
            provenance_id: self.provenance_id,
            code: self.code.clone(),
            operation: self.operation.clone(),
            version: self.version,
            captured_at: self.captured_at,
        }
    }

    /// Parses and validates a snapshot document.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self =
            serde_json::from_str(text).map_err(|e| SnapshotError::Parse(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Serializes the snapshot as an indented document.
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Parse(e.to_string()))
    }

    /// Checks what deserialization alone cannot.
    ///
    /// Patterns and templates are already checked while parsing; this covers
    /// range limits, windows, parameter rules, rule ids and date formats.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for decl in &self.capabilities.declarations {
            if decl.effective.is_empty() {
                return Err(SnapshotError::EmptyWindow(format!(
                    "capability '{}'",
                    decl.field_key
                )));
            }
            if let Some(range) = &decl.range {
                range.min_bound()?;
                range.max_bound()?;
            }
        }

        let mut ids = HashSet::new();
        for rule in &self.render_rules.rules {
            if !ids.insert(rule.rule_id.as_str()) {
                return Err(SnapshotError::DuplicateRule(rule.rule_id.clone()));
            }
            if rule.effective.is_empty() {
                return Err(SnapshotError::EmptyWindow(format!(
                    "render rule '{}'",
                    rule.rule_id
                )));
            }
            if rule.emit == EmitTarget::Params && rule.param_key.is_none() {
                return Err(SnapshotError::MissingParamKey(rule.rule_id.clone()));
            }
            for key in ["date_format", "datetime_format"] {
                if let Some(format) = rule.params.get(key) {
                    check_strftime(format)?;
                }
            }
        }
        Ok(())
    }
}

fn check_strftime(format: &str) -> Result<(), SnapshotError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(SnapshotError::InvalidFormat(format.to_string()));
    }
    Ok(())
}
