//! # litquery-compiler
//!
//! Compiles provider-agnostic [`litquery_expr`] trees into provider-native
//! query strings and request parameters.
//!
//! Every compile runs against one immutable [`ProvenanceSnapshot`]: the
//! provider's capability declarations plus its render rules, as read from
//! the registry at a fixed instant.
//!
//! ## Key Features
//!
//! - **Capability checking** - every violation in the tree is reported at once
//! - **Declarative rendering** - most-specific-wins rule selection over
//!   templates, with per-provider dialects
//! - **Stable fingerprints** - the idempotency key is the canonical hash of
//!   the normalized tree
//! - **Optional parallelism** - enable `parallel` for rayon-backed batches
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use litquery_compiler::{
//!     compile_with_snapshot, CapabilityDeclaration, CapabilitySnapshot, CompileOptions,
//!     InCapability, ProvenanceSnapshot, RenderRule, RenderRuleSnapshot, Template,
//! };
//! use litquery_expr::builder::{any_of, phrase};
//! use litquery_expr::{Expr, Operator};
//!
//! let capabilities = CapabilitySnapshot::default()
//!     .declare(CapabilityDeclaration::new("title").allow(Operator::Term))
//!     .declare(CapabilityDeclaration::new("lang").allow(Operator::In).with_in(InCapability {
//!         max_size: Some(5),
//!         case_sensitive_allowed: false,
//!     }));
//! let rules = RenderRuleSnapshot::default()
//!     .rule(RenderRule::new("term", Template::parse("{field}:{quoted}").unwrap())
//!         .for_operator(Operator::Term))
//!     .rule(RenderRule::new("in", Template::parse("{field}:({values})").unwrap())
//!         .for_operator(Operator::In));
//! let snapshot = ProvenanceSnapshot::new(1, "crossref", "harvest", "search", 4, Utc::now())
//!     .with_capabilities(capabilities)
//!     .with_render_rules(rules);
//!
//! let expr = Expr::and([
//!     Expr::from(phrase("title", "deep learning")),
//!     Expr::from(any_of("lang", ["en", "en", "zh"])),
//!     Expr::truth(),
//! ]);
//! let result = compile_with_snapshot(&expr, &snapshot, &CompileOptions::default()).unwrap();
//!
//! assert!(result.is_ok());
//! assert_eq!(result.query, r#"(title:"deep learning" AND lang:(en OR zh))"#);
//! assert_eq!(result.warnings().len(), 1); // repeated "en"
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      litquery-compiler                       │
//! │                                                              │
//! │  QueryCompiler::compile(request)                             │
//! │  ├── SnapshotSource::fetch(key, as_of)   (one external read) │
//! │  ├── normalize       → folded tree       (litquery-expr)     │
//! │  ├── check           → issues; errors stop here              │
//! │  ├── render          → query + params (+ trace)              │
//! │  └── output budget   → OUTPUT_BUDGET_EXCEEDED                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Taxonomy
//!
//! | Kind | Surfaced as |
//! |------|-------------|
//! | `MALFORMED_EXPRESSION` | `Err(CompileError::Malformed)` |
//! | `CAPABILITY_VIOLATION` | error issues in the report |
//! | `RENDER_RULE_MISSING` | error issues in the report |
//! | `OUTPUT_BUDGET_EXCEEDED` | error issue in the report |
//! | `DEPENDENCY_UNAVAILABLE` | `Err(CompileError::DependencyUnavailable / DeadlineExceeded)` |
//! | `INVALID_CONFIG` | `Err(CompileError::InvalidConfig)` |
//!
//! ## Feature Flags
//!
//! - `parallel` - Compiles batches with rayon

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod checker;
mod compiler;
mod config;
mod error;
mod issue;
mod renderer;
mod result;
mod rules;
pub mod snapshot;
mod template;
mod traits;

// Public re-exports
pub use checker::check;
pub use compiler::{compile_with_snapshot, CompileRequest, QueryCompiler};
pub use config::{
    parse_timezone, CompileOptions, CompileOptionsBuilder, CompilerConfig, CompilerConfigBuilder,
};
pub use error::{CompileError, CompilerResult, ErrorKind};
pub use issue::{Issue, IssueCode, Severity, ValidationReport};
pub use renderer::{render, RenderOutput, UTC_DATETIME_FORMAT};
pub use result::{CompileResult, RenderTrace, TraceRecord};
pub use rules::{RuleIndex, RuleQuery};
pub use snapshot::{
    BoundsEnforcement, CapabilityDeclaration, CapabilitySnapshot, EffectiveWindow, EmitTarget,
    InCapability, Pattern, ProvenanceSnapshot, RangeCapability, RenderDialect, RenderRule,
    RenderRuleSnapshot, SnapshotError, SnapshotRef, TermCapability, TokenCapability, Transform,
};
pub use template::{Placeholder, Segment, Template};
pub use traits::{SnapshotKey, SnapshotSource, SourceError};
