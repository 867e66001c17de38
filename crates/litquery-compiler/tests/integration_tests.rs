//! End-to-end compile tests against a Crossref-like snapshot.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use common::{crossref, init_tracing, DownSource, MockSource, SlowSource};
use litquery_compiler::{
    compile_with_snapshot, CompileError, CompileOptions, CompileRequest, CompileResult,
    CompilerConfig, ErrorKind, IssueCode, ProvenanceSnapshot, QueryCompiler, SnapshotKey,
    SnapshotSource, SourceError,
};
use litquery_expr::builder::{any_of, date_range, datetime_range, exact, exists, phrase, token};
use litquery_expr::{DateTimeValue, Expr};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn compile(expr: &Expr) -> CompileResult {
    compile_with_snapshot(expr, &crossref(), &CompileOptions::default()).unwrap()
}

fn error_codes(result: &CompileResult) -> Vec<IssueCode> {
    result.errors().iter().map(|i| i.code).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_scenario_a_term_and_in() {
    init_tracing();
    let expr = Expr::and([
        Expr::from(phrase("title", "deep learning")),
        Expr::from(any_of("lang", ["en", "en", "zh"])),
        Expr::truth(),
    ]);
    let result = compile(&expr);

    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert!(!result.query.is_empty());
    assert!(result.query.contains(r#"title:"deep learning""#));
    assert!(result.query.contains(r#"lang:("en" OR "zh")"#));
    assert_eq!(
        result.query,
        r#"(title:"deep learning" AND lang:("en" OR "zh"))"#
    );
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(result.warnings()[0].code, IssueCode::InDuplicateValues);
    assert_eq!(result.normalized.atoms().len(), 2);
}

#[test]
fn test_scenario_b_range_kind_mismatch() {
    let expr = Expr::from(date_range(
        "published",
        Some(date(2024, 1, 1)),
        Some(date(2024, 12, 31)),
    ));
    let result = compile(&expr);

    assert_eq!(error_codes(&result), vec![IssueCode::RangeKindMismatch]);
    assert!(result.errors()[0].message.contains("range kind mismatch"));
    assert_eq!(result.query, "");
    assert!(result.params.is_empty());
}

#[test]
fn test_scenario_c_negated_exists() {
    let expr = Expr::not(Expr::from(exists("retracted")));
    let result = compile(&expr);

    assert_eq!(error_codes(&result), vec![IssueCode::NegationNotAllowed]);
    assert!(result.errors()[0].message.contains("negation"));
    assert_eq!(result.errors()[0].context["field"], "retracted");
}

#[test]
fn test_negation_over_group_reaches_atoms() {
    let expr = Expr::not(Expr::and([
        Expr::from(exists("retracted")),
        Expr::from(phrase("title", "x")),
    ]));
    let result = compile(&expr);

    assert_eq!(error_codes(&result), vec![IssueCode::NegationNotAllowed]);
    assert_eq!(result.errors()[0].context["field"], "retracted");
    assert!(result.query.is_empty());

    // Two negations cancel out.
    let expr = Expr::not(Expr::and([
        Expr::not(Expr::from(exists("retracted"))),
        Expr::from(phrase("title", "x")),
    ]));
    assert!(compile(&expr).errors().is_empty());
}

#[test]
fn test_scenario_d_output_budget() {
    // title:"<492 chars>" renders to exactly 500 characters
    let text = "a".repeat(492);
    let expr = Expr::from(phrase("title", text));
    let options = CompileOptions::builder().with_max_query_length(100).build();
    let result = compile_with_snapshot(&expr, &crossref(), &options).unwrap();

    assert_eq!(error_codes(&result), vec![IssueCode::OutputBudgetExceeded]);
    assert_eq!(result.errors()[0].context["length"], "500");
    assert_eq!(result.errors()[0].context["max_query_length"], "100");
    assert_eq!(result.error_kind(), Some(ErrorKind::OutputBudgetExceeded));

    let unbounded = compile(&expr);
    assert_eq!(unbounded.query.chars().count(), 500);
    assert!(unbounded.is_ok());
}

// =============================================================================
// Capability and render behavior
// =============================================================================

#[test]
fn test_unknown_field_rejected_for_every_operator() {
    for atom in [
        phrase("abstract", "x"),
        any_of("abstract", ["x"]),
        date_range("abstract", Some(date(2020, 1, 1)), None),
        exists("abstract"),
        token("abstract", "doi", "10.1000/1"),
    ] {
        let result = compile(&Expr::from(atom));
        assert!(!result.is_ok());
        assert!(result
            .errors()
            .iter()
            .any(|i| i.code == IssueCode::FieldNotSupported && i.context["field"] == "abstract"));
    }
}

#[test]
fn test_all_violations_reported_together() {
    let expr = Expr::and([
        Expr::from(any_of("title", ["x"])),
        Expr::from(token("doi", "pmid", "123")),
        Expr::from(phrase("keywords", "x")),
    ]);
    let result = compile(&expr);
    assert_eq!(
        error_codes(&result),
        vec![
            IssueCode::OperatorNotAllowed,
            IssueCode::TokenKindNotAllowed,
            IssueCode::TokenPatternMismatch,
            IssueCode::FieldNotSupported,
        ]
    );
    assert_eq!(result.error_kind(), Some(ErrorKind::CapabilityViolation));
}

#[test]
fn test_negated_term_uses_dialect_wrapper() {
    let expr = Expr::and([
        Expr::from(phrase("title", "graphs")),
        Expr::not(Expr::from(exact("title", "survey"))),
    ]);
    let options = CompileOptions::builder().with_trace(true).build();
    let result = compile_with_snapshot(&expr, &crossref(), &options).unwrap();

    assert!(result.is_ok(), "{:?}", result.errors());
    assert_eq!(result.query, r#"(title:"graphs" AND NOT title:=survey)"#);
    let trace = result.trace.unwrap();
    assert_eq!(
        trace.rule_ids().collect::<Vec<_>>(),
        vec!["term-phrase", "term-exact"]
    );
    assert!(trace.records[1].negation_wrapped);
}

#[test]
fn test_false_renders_match_nothing() {
    let expr = Expr::and([Expr::from(phrase("title", "x")), Expr::falsity()]);
    let result = compile(&expr);
    assert_eq!(result.normalized, Expr::falsity());
    assert_eq!(result.query, "-*:*");
}

#[test]
fn test_params_emitted_separately() {
    let expr = Expr::and([
        Expr::from(phrase("title", "graphs")),
        Expr::from(phrase("type", "journal-article")),
    ]);
    let result = compile(&expr);
    assert!(result.is_ok());
    assert_eq!(result.query, r#"title:"graphs""#);

    let mut expected = BTreeMap::new();
    expected.insert("filter".to_string(), "type:journal-article".to_string());
    assert_eq!(result.params, expected);
}

#[test]
fn test_params_under_or_warn() {
    let expr = Expr::or([
        Expr::from(phrase("title", "graphs")),
        Expr::from(phrase("type", "book")),
    ]);
    let result = compile(&expr);
    assert!(result.is_ok());
    assert_eq!(result.warnings()[0].code, IssueCode::ParamUnderDisjunction);
}

#[test]
fn test_missing_render_rule_is_distinct_kind() {
    let mut snapshot = crossref();
    snapshot.render_rules.rules.retain(|r| r.rule_id != "doi");
    let expr = Expr::from(token("doi", "doi", "10.1000/182"));
    let result = compile_with_snapshot(&expr, &snapshot, &CompileOptions::default()).unwrap();

    assert_eq!(error_codes(&result), vec![IssueCode::RenderRuleMissing]);
    assert_eq!(result.error_kind(), Some(ErrorKind::RenderRuleMissing));
    assert_eq!(result.query, "");
}

#[test]
fn test_soft_limit_warns_unless_strict() {
    let expr = Expr::from(date_range(
        "issued",
        Some(date(1850, 1, 1)),
        Some(date(1950, 1, 1)),
    ));
    let lenient = compile(&expr);
    assert!(lenient.is_ok());
    assert_eq!(lenient.warnings()[0].code, IssueCode::RangeBelowMin);
    assert_eq!(lenient.query, "issued:[1850-01-01 TO 1950-01-01]");

    let strict = CompileOptions::builder().with_strict(true).build();
    let result = compile_with_snapshot(&expr, &crossref(), &strict).unwrap();
    assert_eq!(error_codes(&result), vec![IssueCode::RangeBelowMin]);
}

#[test]
fn test_naive_datetime_rendered_in_utc() {
    let local = date(2024, 3, 1).and_hms_opt(10, 0, 0).unwrap();
    let expr = Expr::from(datetime_range(
        "published",
        Some(DateTimeValue::naive(local)),
        None,
    ));
    let options = CompileOptions::builder().with_timezone("+02:00").build();
    let result = compile_with_snapshot(&expr, &crossref(), &options).unwrap();
    assert_eq!(result.query, "published:[2024-03-01T08:00:00Z TO *]");

    let offset = FixedOffset::west_opt(5 * 3600).unwrap();
    let explicit = Expr::from(datetime_range(
        "published",
        None,
        Some(DateTimeValue::with_offset(local, offset)),
    ));
    let result = compile_with_snapshot(&explicit, &crossref(), &options).unwrap();
    assert_eq!(result.query, "published:[* TO 2024-03-01T15:00:00Z]");
}

// =============================================================================
// Normalization and idempotency
// =============================================================================

#[test]
fn test_strict_rejects_single_child_group() {
    let expr = Expr::and([Expr::from(phrase("title", "x"))]);
    let strict = CompileOptions::builder().with_strict(true).build();
    let err = compile_with_snapshot(&expr, &crossref(), &strict).unwrap_err();
    assert!(matches!(err, CompileError::Malformed(_)));
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    assert!(compile(&expr).is_ok());
}

#[test]
fn test_idempotency_key_follows_normalized_tree() {
    let a = Expr::from(phrase("title", "graphs"));
    let b = Expr::from(any_of("lang", ["en"]));

    let first = compile(&Expr::and([a.clone(), Expr::truth(), b.clone()]));
    let second = compile(&Expr::and([a.clone(), Expr::and([b.clone()])]));
    assert_eq!(
        first.idempotency_key().unwrap(),
        second.idempotency_key().unwrap()
    );

    // Operand order is part of the identity
    let swapped = compile(&Expr::and([b, a]));
    assert_ne!(
        first.idempotency_key().unwrap(),
        swapped.idempotency_key().unwrap()
    );
}

// =============================================================================
// Orchestrator and snapshot source
// =============================================================================

#[test]
fn test_compiler_fetches_and_records_snapshot() {
    let source = MockSource::with(crossref());
    let compiler = QueryCompiler::new(&source);
    let request = CompileRequest::new(
        Expr::from(phrase("title", "graphs")),
        "crossref",
        "harvest",
        "search",
    );

    let result = compiler.compile(&request).unwrap();
    assert_eq!(result.query, r#"title:"graphs""#);
    assert_eq!(result.snapshot.provenance_id, 7);
    assert_eq!(result.snapshot.version, 12);
    assert_eq!(source.fetches(), 1);
}

#[test]
fn test_unknown_provenance_is_dependency_unavailable() {
    let source = MockSource::with(crossref());
    let compiler = QueryCompiler::new(&source);
    let request = CompileRequest::new(Expr::truth(), "pubmed", "harvest", "search");

    match compiler.compile(&request) {
        Err(CompileError::DependencyUnavailable { key, source }) => {
            assert_eq!(key.provenance, "pubmed");
            assert!(matches!(source, SourceError::NotFound(_)));
        }
        other => panic!("expected dependency error, got {:?}", other),
    }
}

#[test]
fn test_source_outage_surfaces_typed_error() {
    let compiler = QueryCompiler::new(&DownSource);
    let request = CompileRequest::new(Expr::truth(), "crossref", "harvest", "search");
    let err = compiler.compile(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
    assert!(err.to_string().contains("registry connection refused"));
}

#[test]
fn test_snapshot_deadline() {
    let source = SlowSource {
        inner: MockSource::with(crossref()),
        delay: Duration::from_millis(50),
    };
    let config = CompilerConfig::builder()
        .with_snapshot_deadline(Duration::from_millis(5))
        .build();
    let compiler = QueryCompiler::with_config(&source, config);
    let request = CompileRequest::new(Expr::truth(), "crossref", "harvest", "search");

    let err = compiler.compile(&request).unwrap_err();
    assert!(matches!(err, CompileError::DeadlineExceeded { .. }));
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
}

#[test]
fn test_source_timeout_is_dependency_unavailable() {
    struct TimedOut;

    impl SnapshotSource for TimedOut {
        fn fetch(
            &self,
            _key: &SnapshotKey,
            _as_of: DateTime<Utc>,
        ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
            Err(SourceError::Timeout(Duration::from_millis(5)))
        }
    }

    let config = CompilerConfig::builder()
        .with_snapshot_deadline(Duration::from_secs(1))
        .build();
    let compiler = QueryCompiler::with_config(&TimedOut, config);
    let request = CompileRequest::new(Expr::truth(), "crossref", "harvest", "search");

    let err = compiler.compile(&request).unwrap_err();
    assert!(matches!(
        err,
        CompileError::DependencyUnavailable {
            source: SourceError::Timeout(_),
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
}

#[test]
fn test_default_options_from_config() {
    let source = MockSource::with(crossref());
    let config = CompilerConfig::builder()
        .with_default_options(CompileOptions::builder().with_max_query_length(5).build())
        .build();
    let compiler = QueryCompiler::with_config(&source, config);

    let request = CompileRequest::new(
        Expr::from(phrase("title", "graphs")),
        "crossref",
        "harvest",
        "search",
    );
    let result = compiler.compile(&request).unwrap();
    assert_eq!(error_codes(&result), vec![IssueCode::OutputBudgetExceeded]);

    let overridden = request.with_options(CompileOptions::default());
    assert!(compiler.compile(&overridden).unwrap().is_ok());
}

#[test]
fn test_batch_keeps_request_order() {
    let source = MockSource::with(crossref());
    let compiler = QueryCompiler::new(&source);
    let requests = vec![
        CompileRequest::new(Expr::from(phrase("title", "a")), "crossref", "harvest", "search"),
        CompileRequest::new(Expr::truth(), "pubmed", "harvest", "search"),
        CompileRequest::new(Expr::from(exists("retracted")), "crossref", "harvest", "search"),
    ];

    let results = compiler.compile_batch(&requests);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().query, r#"title:"a""#);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().query, "_exists_:retracted");
}

#[test]
fn test_rejected_result_into_error() {
    let expr = Expr::from(any_of("lang", ["en", "zh", "de", "fr", "es", "it"]));
    let err = compile(&expr).into_result().unwrap_err();
    match err {
        CompileError::Rejected { kind, issues } => {
            assert_eq!(kind, ErrorKind::CapabilityViolation);
            assert_eq!(issues[0].code, IssueCode::InListTooLarge);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn test_snapshot_document_round_trip_compiles_identically() {
    let snapshot = crossref();
    let text = snapshot.to_json_pretty().unwrap();
    let loaded = ProvenanceSnapshot::from_json(&text).unwrap();
    assert_eq!(loaded, snapshot);

    let expr = Expr::and([
        Expr::from(phrase("title", "graphs")),
        Expr::from(any_of("lang", ["en", "zh"])),
    ]);
    let options = CompileOptions::default();
    assert_eq!(
        compile_with_snapshot(&expr, &loaded, &options).unwrap(),
        compile_with_snapshot(&expr, &snapshot, &options).unwrap()
    );
}
