//! # litquery-registry
//!
//! Snapshot sources for [`litquery_compiler`].
//!
//! The compiler reads provider capabilities and render rules through the
//! [`SnapshotSource`](litquery_compiler::SnapshotSource) trait. This crate
//! provides the sources a deployment wires in front of the registry service:
//!
//! - [`InMemorySnapshotSource`] - versioned snapshots held in a map
//! - [`FileSnapshotStore`] - JSON documents with a checksummed manifest
//!   (feature `persistence`)
//! - [`CachingSnapshotSource`] - LRU + TTL cache around any other source
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use litquery_compiler::{
//!     CapabilityDeclaration, CapabilitySnapshot, CompileRequest, ProvenanceSnapshot,
//!     QueryCompiler, RenderRule, RenderRuleSnapshot, Template,
//! };
//! use litquery_expr::builder::phrase;
//! use litquery_expr::{Expr, Operator};
//! use litquery_registry::{CacheConfig, CachingSnapshotSource, InMemorySnapshotSource};
//!
//! let registry = InMemorySnapshotSource::new();
//! registry
//!     .insert(
//!         ProvenanceSnapshot::new(1, "crossref", "harvest", "search", 1, Utc::now())
//!             .with_capabilities(CapabilitySnapshot::default().declare(
//!                 CapabilityDeclaration::new("title").allow(Operator::Term),
//!             ))
//!             .with_render_rules(RenderRuleSnapshot::default().rule(RenderRule::new(
//!                 "title",
//!                 Template::parse("{field}:{quoted}").unwrap(),
//!             ))),
//!     )
//!     .unwrap();
//!
//! let source = CachingSnapshotSource::new(registry, CacheConfig::default());
//! let compiler = QueryCompiler::new(&source);
//!
//! let request = CompileRequest::new(Expr::from(phrase("title", "graphs")), "crossref", "harvest", "search");
//! let result = compiler.compile(&request).unwrap();
//! assert_eq!(result.query, r#"title:"graphs""#);
//! ```
//!
//! ## Feature Flags
//!
//! - `persistence` (default) - [`FileSnapshotStore`] and its manifest

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
mod config;
mod error;
mod memory;

#[cfg(feature = "persistence")]
pub mod persistence;

// Public re-exports
pub use cache::{CacheStats, CachedSnapshot, CachingSnapshotSource, SnapshotCache};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::{RegistryError, RegistryResult};
pub use memory::InMemorySnapshotSource;

#[cfg(feature = "persistence")]
pub use persistence::{FileSnapshotStore, ManifestEntry, SnapshotManifest};
