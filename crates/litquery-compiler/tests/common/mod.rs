//! Shared fixtures: a Crossref-like snapshot and mock snapshot sources.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use litquery_compiler::{
    BoundsEnforcement, CapabilityDeclaration, CapabilitySnapshot, InCapability, Pattern,
    ProvenanceSnapshot, RangeCapability, RenderDialect, RenderRule, RenderRuleSnapshot,
    SnapshotKey, SnapshotSource, SourceError, Template, TermCapability, TokenCapability,
};
use litquery_expr::{MatchType, Operator, RangeKind};

pub fn captured_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn template(text: &str) -> Template {
    Template::parse(text).unwrap()
}

pub fn capabilities() -> CapabilitySnapshot {
    CapabilitySnapshot::default()
        .declare(
            CapabilityDeclaration::new("title")
                .allow_negated(Operator::Term)
                .with_term(TermCapability {
                    match_types: [MatchType::Phrase, MatchType::Exact].into_iter().collect(),
                    max_length: Some(600),
                    ..TermCapability::default()
                }),
        )
        .declare(
            CapabilityDeclaration::new("lang")
                .allow(Operator::In)
                .with_in(InCapability {
                    max_size: Some(5),
                    case_sensitive_allowed: false,
                }),
        )
        .declare(
            CapabilityDeclaration::new("published")
                .allow(Operator::Range)
                .with_range(RangeCapability::new(RangeKind::DateTime)),
        )
        .declare(
            CapabilityDeclaration::new("issued")
                .allow(Operator::Range)
                .with_range(RangeCapability {
                    min: Some("1900-01-01".to_string()),
                    bounds_enforcement: BoundsEnforcement::Soft,
                    ..RangeCapability::new(RangeKind::Date)
                }),
        )
        .declare(CapabilityDeclaration::new("retracted").allow(Operator::Exists))
        .declare(
            CapabilityDeclaration::new("doi")
                .allow(Operator::Token)
                .with_token(TokenCapability {
                    kinds: ["doi".to_string()].into_iter().collect(),
                    pattern: Some(Pattern::new(r"10\.\d{4,9}/\S+").unwrap()),
                }),
        )
        .declare(CapabilityDeclaration::new("type").allow(Operator::Term))
}

pub fn render_rules() -> RenderRuleSnapshot {
    let dialect = RenderDialect {
        match_nothing: Some("-*:*".to_string()),
        ..RenderDialect::default()
    };
    RenderRuleSnapshot::new(
        dialect,
        vec![
            RenderRule::new("term-phrase", template("{field}:{quoted}"))
                .for_operator(Operator::Term)
                .for_match_type(MatchType::Phrase),
            RenderRule::new("term-exact", template("{field}:={value}"))
                .for_operator(Operator::Term)
                .for_match_type(MatchType::Exact),
            RenderRule::new("in", template("{field}:({values})"))
                .for_operator(Operator::In)
                .with_items(template("{quoted}"), " OR "),
            RenderRule::new(
                "range",
                template("{field}:{lower_bracket}{lower} TO {upper}{upper_bracket}"),
            )
            .for_operator(Operator::Range),
            RenderRule::new("exists", template("_exists_:{field}"))
                .for_operator(Operator::Exists)
                .for_value_type("PRESENT"),
            RenderRule::new("doi", template("doi:{quoted}")).for_field("doi"),
            RenderRule::new("type-filter", template("{field}:{value}"))
                .for_field("type")
                .for_operator(Operator::Term)
                .with_priority(10)
                .emit_param("filter"),
        ],
    )
}

pub fn crossref() -> ProvenanceSnapshot {
    ProvenanceSnapshot::new(7, "crossref", "harvest", "search", 12, captured_at())
        .with_capabilities(capabilities())
        .with_render_rules(render_rules())
}

/// Keyed in-memory source that counts fetches.
#[derive(Default)]
pub struct MockSource {
    snapshots: HashMap<SnapshotKey, Arc<ProvenanceSnapshot>>,
    fetches: AtomicUsize,
}

impl MockSource {
    pub fn with(snapshot: ProvenanceSnapshot) -> Self {
        let mut source = Self::default();
        source.snapshots.insert(snapshot.key(), Arc::new(snapshot));
        source
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for MockSource {
    fn fetch(
        &self,
        key: &SnapshotKey,
        _as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(key.clone()))
    }
}

/// Source that answers after a delay.
pub struct SlowSource {
    pub inner: MockSource,
    pub delay: Duration,
}

impl SnapshotSource for SlowSource {
    fn fetch(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        thread::sleep(self.delay);
        self.inner.fetch(key, as_of)
    }
}

/// Source whose backend is down.
pub struct DownSource;

impl SnapshotSource for DownSource {
    fn fetch(
        &self,
        _key: &SnapshotKey,
        _as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        Err(SourceError::Unavailable("registry connection refused".to_string()))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
