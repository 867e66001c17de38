//! Integration tests for the snapshot sources.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use litquery_compiler::{
    CapabilityDeclaration, CapabilitySnapshot, CompileRequest, ErrorKind, ProvenanceSnapshot,
    QueryCompiler, RenderRule, RenderRuleSnapshot, SnapshotKey, SnapshotSource, SourceError,
    Template,
};
use litquery_expr::builder::phrase;
use litquery_expr::{Expr, Operator};
use litquery_registry::{
    CacheConfig, CachingSnapshotSource, FileSnapshotStore, InMemorySnapshotSource,
};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn at(month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()
}

fn key() -> SnapshotKey {
    SnapshotKey::new("crossref", "harvest", "search")
}

/// Snapshot whose declarations are `title` plus `extra` numbered fields.
fn snapshot(version: u64, captured_at: DateTime<Utc>, extra: usize) -> ProvenanceSnapshot {
    let mut capabilities = CapabilitySnapshot::default()
        .declare(CapabilityDeclaration::new("title").allow(Operator::Term));
    for i in 0..extra {
        capabilities = capabilities
            .declare(CapabilityDeclaration::new(format!("f{i}")).allow(Operator::Term));
    }
    ProvenanceSnapshot::new(7, "crossref", "harvest", "search", version, captured_at)
        .with_capabilities(capabilities)
        .with_render_rules(RenderRuleSnapshot::default().rule(RenderRule::new(
            "term",
            Template::parse("{field}:{quoted}").unwrap(),
        )))
}

fn title_request() -> CompileRequest {
    CompileRequest::new(
        Expr::from(phrase("title", "graph neural networks")),
        "crossref",
        "harvest",
        "search",
    )
}

// ============================================================================
// In-memory source through the compiler
// ============================================================================

#[test]
fn test_compile_reads_version_as_of_request_instant() {
    init_tracing();
    let registry = InMemorySnapshotSource::new();
    registry.insert(snapshot(1, at(1), 0)).unwrap();
    registry.insert(snapshot(2, at(6), 0)).unwrap();
    let compiler = QueryCompiler::new(&registry);

    let early = compiler.compile(&title_request().as_of(at(3))).unwrap();
    assert_eq!(early.snapshot.version, 1);

    let late = compiler.compile(&title_request().as_of(at(7))).unwrap();
    assert_eq!(late.snapshot.version, 2);
    assert_eq!(late.query, r#"title:"graph neural networks""#);

    let last_year = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let before = compiler.compile(&title_request().as_of(last_year));
    assert_eq!(before.unwrap_err().kind(), ErrorKind::DependencyUnavailable);
}

#[test]
fn test_cached_compiles_hit_after_first_load() {
    let registry = InMemorySnapshotSource::new();
    registry.insert(snapshot(1, at(1), 0)).unwrap();
    let source = CachingSnapshotSource::new(registry, CacheConfig::default());
    let compiler = QueryCompiler::new(&source);

    for _ in 0..5 {
        assert!(compiler.compile(&title_request()).unwrap().is_ok());
    }
    let stats = source.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
}

#[test]
fn test_refresh_picks_up_new_registry_version() {
    let registry = Arc::new(InMemorySnapshotSource::new());
    registry.insert(snapshot(1, at(1), 0)).unwrap();
    let source = CachingSnapshotSource::new(Arc::clone(&registry), CacheConfig::default());

    assert_eq!(source.fetch(&key(), Utc::now()).unwrap().version, 1);

    registry.insert(snapshot(2, at(2), 0)).unwrap();
    // Still fresh in the cache.
    assert_eq!(source.fetch(&key(), Utc::now()).unwrap().version, 1);

    assert_eq!(source.refresh(&key()).unwrap().version, 2);
    assert_eq!(source.fetch(&key(), Utc::now()).unwrap().version, 2);
}

#[test]
fn test_readers_never_see_partial_snapshots() {
    let registry = Arc::new(InMemorySnapshotSource::new());
    registry.insert(snapshot(1, at(1), 1)).unwrap();
    let source = CachingSnapshotSource::new(Arc::clone(&registry), CacheConfig::default());

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    let snap = source.fetch(&key(), Utc::now()).unwrap();
                    // Version v always carries title plus v extra fields.
                    assert_eq!(
                        snap.capabilities.declarations.len() as u64,
                        snap.version + 1
                    );
                }
            });
        }
        scope.spawn(|| {
            for version in 2..=20u64 {
                registry
                    .insert(snapshot(version, at(1), version as usize))
                    .unwrap();
                source.refresh(&key()).unwrap();
            }
        });
    });

    assert_eq!(source.fetch(&key(), Utc::now()).unwrap().version, 20);
}

// ============================================================================
// File store
// ============================================================================

#[test]
fn test_file_store_serves_compiler() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    store.save(&snapshot(3, at(1), 2)).unwrap();

    let source = CachingSnapshotSource::new(store, CacheConfig::default());
    let compiler = QueryCompiler::new(&source);
    let result = compiler.compile(&title_request()).unwrap();

    assert!(result.is_ok());
    assert_eq!(result.snapshot.version, 3);
    assert_eq!(source.inner().manifest().count(), 1);
}

#[test]
fn test_tampered_document_is_rejected() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    store.save(&snapshot(3, at(1), 0)).unwrap();

    let path = store.path_for(&key()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, format!("{text}\n")).unwrap();

    assert!(matches!(
        store.fetch(&key(), Utc::now()),
        Err(SourceError::Invalid(_))
    ));

    let compiler = QueryCompiler::new(&store);
    let err = compiler.compile(&title_request()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
}

#[test]
fn test_file_store_respects_as_of() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    store.save(&snapshot(3, at(6), 0)).unwrap();

    assert_eq!(store.fetch(&key(), at(7)).unwrap().version, 3);
    assert_eq!(
        store.fetch(&key(), at(5)).unwrap_err(),
        SourceError::NotFound(key())
    );
}

#[test]
fn test_saved_snapshots_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        store.save(&snapshot(1, at(1), 0)).unwrap();
        store.save(&snapshot(2, at(2), 1)).unwrap();
        store
            .save(&ProvenanceSnapshot::new(9, "arxiv", "harvest", "list", 1, at(1)))
            .unwrap();
    }

    let reopened = FileSnapshotStore::open(dir.path()).unwrap();
    assert_eq!(reopened.manifest().count(), 2);
    let loaded = reopened.load(&key()).unwrap();
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.capabilities.declarations.len(), 2);
}

#[test]
fn test_stale_entry_outlives_registry_outage() {
    struct Outage;

    impl SnapshotSource for Outage {
        fn fetch(
            &self,
            _key: &SnapshotKey,
            _as_of: DateTime<Utc>,
        ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
            Err(SourceError::Timeout(Duration::from_millis(200)))
        }
    }

    let source = CachingSnapshotSource::new(
        Outage,
        CacheConfig::builder()
            .with_ttl(Duration::ZERO)
            .with_serve_stale_on_error(true)
            .build(),
    );
    assert!(source.fetch(&key(), Utc::now()).is_err());

    source.cache().insert(Arc::new(snapshot(5, at(1), 0)));
    assert_eq!(source.fetch(&key(), Utc::now()).unwrap().version, 5);
    assert_eq!(source.stats().stale_served, 1);
}
