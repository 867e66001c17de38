//! Compile orchestrator.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use litquery_expr::{normalize, Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::checker::check;
use crate::config::{CompileOptions, CompilerConfig};
use crate::error::{CompileError, CompilerResult};
use crate::issue::{Issue, IssueCode, ValidationReport};
use crate::renderer::render;
use crate::result::CompileResult;
use crate::snapshot::ProvenanceSnapshot;
use crate::traits::{SnapshotKey, SnapshotSource};

/// One compile request from the orchestration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileRequest {
    /// Tree to compile.
    pub expr: Expr,
    /// Provenance code.
    pub provenance: String,
    /// Task type.
    pub task_type: String,
    /// Operation code.
    pub operation: String,
    /// Options; the compiler's defaults apply when absent.
    #[serde(default)]
    pub options: Option<CompileOptions>,
    /// Registry instant to read; now when absent.
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

impl CompileRequest {
    /// Creates a request with default options.
    pub fn new(
        expr: Expr,
        provenance: impl Into<String>,
        task_type: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            expr,
            provenance: provenance.into(),
            task_type: task_type.into(),
            operation: operation.into(),
            options: None,
            as_of: None,
        }
    }

    /// Sets per-request options.
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Reads the registry as of a fixed instant.
    pub fn as_of(mut self, instant: DateTime<Utc>) -> Self {
        self.as_of = Some(instant);
        self
    }

    /// Snapshot key for this request.
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(&self.provenance, &self.task_type, &self.operation)
    }
}

/// Compiles requests against snapshots from a [`SnapshotSource`].
///
/// The compiler holds no mutable state; one instance can serve any number
/// of concurrent compiles.
///
/// # Example
///
/// ```ignore
/// use litquery_compiler::{CompileRequest, QueryCompiler};
///
/// // Assumes `source` implements SnapshotSource
/// let compiler = QueryCompiler::new(&source);
/// let request = CompileRequest::new(expr, "crossref", "harvest", "search");
///
/// let result = compiler.compile(&request)?;
/// println!("{} ({} warnings)", result.query, result.warnings().len());
/// ```
pub struct QueryCompiler<'a> {
    source: &'a dyn SnapshotSource,
    config: CompilerConfig,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler with default configuration.
    pub fn new(source: &'a dyn SnapshotSource) -> Self {
        Self {
            source,
            config: CompilerConfig::default(),
        }
    }

    /// Creates a compiler with custom configuration.
    ///
    /// ```ignore
    /// let config = CompilerConfig::builder()
    ///     .with_snapshot_deadline(Duration::from_millis(250))
    ///     .build();
    /// let compiler = QueryCompiler::with_config(&source, config);
    /// ```
    pub fn with_config(source: &'a dyn SnapshotSource, config: CompilerConfig) -> Self {
        Self { source, config }
    }

    /// Returns the compiler configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles one request.
    ///
    /// # Returns
    ///
    /// * `Ok(CompileResult)` - Possibly carrying error issues; see [`CompileResult::is_ok`]
    /// * `Err(CompileError)` - Malformed tree, invalid options, or no snapshot
    pub fn compile(&self, request: &CompileRequest) -> CompilerResult<CompileResult> {
        let options = request
            .options
            .as_ref()
            .unwrap_or(&self.config.default_options);
        // Reject bad options before touching the source.
        options.utc_offset()?;

        let key = request.key();
        let snapshot = self.load_snapshot(&key, request.as_of.unwrap_or_else(Utc::now))?;
        compile_with_snapshot(&request.expr, &snapshot, options)
    }

    /// Compiles many requests. Results keep request order.
    #[cfg(not(feature = "parallel"))]
    pub fn compile_batch(&self, requests: &[CompileRequest]) -> Vec<CompilerResult<CompileResult>> {
        requests.iter().map(|request| self.compile(request)).collect()
    }

    /// Compiles many requests in parallel. Results keep request order.
    #[cfg(feature = "parallel")]
    pub fn compile_batch(&self, requests: &[CompileRequest]) -> Vec<CompilerResult<CompileResult>> {
        use rayon::prelude::*;

        requests.par_iter().map(|request| self.compile(request)).collect()
    }

    /// Fetches the snapshot, then applies the deadline to the elapsed time.
    fn load_snapshot(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> CompilerResult<Arc<ProvenanceSnapshot>> {
        let started = Instant::now();
        let fetched = self.source.fetch(key, as_of);
        let elapsed = started.elapsed();

        let snapshot = fetched.map_err(|source| {
            error!(snapshot = %key, error = %source, "snapshot source failed");
            CompileError::DependencyUnavailable {
                key: key.clone(),
                source,
            }
        })?;

        if let Some(deadline) = self.config.snapshot_deadline {
            if elapsed > deadline {
                warn!(
                    snapshot = %key,
                    elapsed_ms = elapsed.as_millis() as u64,
                    deadline_ms = deadline.as_millis() as u64,
                    "snapshot load exceeded deadline"
                );
                return Err(CompileError::DeadlineExceeded {
                    key: key.clone(),
                    deadline,
                });
            }
        }

        debug!(
            snapshot = %key,
            version = snapshot.version,
            elapsed_us = elapsed.as_micros() as u64,
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}

/// Compiles a tree against a snapshot the caller already holds.
///
/// Runs normalize, check, render and the output budget check. Check errors
/// stop the pipeline before rendering; the result then carries the
/// normalized tree and the full report but no query.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use litquery_compiler::{
///     compile_with_snapshot, CapabilityDeclaration, CapabilitySnapshot, CompileOptions,
///     ProvenanceSnapshot, RenderRule, RenderRuleSnapshot, Template,
/// };
/// use litquery_expr::builder::phrase;
/// use litquery_expr::{Expr, Operator};
///
/// let snapshot = ProvenanceSnapshot::new(1, "crossref", "harvest", "search", 1, Utc::now())
///     .with_capabilities(CapabilitySnapshot::default().declare(
///         CapabilityDeclaration::new("title").allow(Operator::Term),
///     ))
///     .with_render_rules(RenderRuleSnapshot::default().rule(RenderRule::new(
///         "title",
///         Template::parse("{field}:{quoted}").unwrap(),
///     )));
///
/// let expr = Expr::and([Expr::from(phrase("title", "graphs")), Expr::truth()]);
/// let result = compile_with_snapshot(&expr, &snapshot, &CompileOptions::default()).unwrap();
/// assert_eq!(result.query, r#"title:"graphs""#);
/// ```
pub fn compile_with_snapshot(
    expr: &Expr,
    snapshot: &ProvenanceSnapshot,
    options: &CompileOptions,
) -> CompilerResult<CompileResult> {
    let started = Instant::now();
    let tz = options.utc_offset()?;

    let normalized = normalize(expr, options.strict)?;
    debug!(
        nodes_in = expr.node_count(),
        nodes_out = normalized.node_count(),
        "normalized expression"
    );

    let mut report = ValidationReport::default();
    report.extend(check(&normalized, snapshot, options.strict));
    debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "capability check finished"
    );
    if report.has_errors() {
        log_rejection(snapshot, &report, "capability check");
        return Ok(CompileResult::rejected(
            normalized,
            report,
            snapshot.snapshot_ref(),
        ));
    }

    let output = render(&normalized, snapshot, tz, options.trace_enabled);
    report.extend(output.issues);
    debug!(query_len = output.query.len(), params = output.params.len(), "rendered");
    if report.has_errors() {
        log_rejection(snapshot, &report, "render");
        let mut result = CompileResult::rejected(normalized, report, snapshot.snapshot_ref());
        result.trace = output.trace;
        return Ok(result);
    }

    let query_len = output.query.chars().count();
    if options.max_query_length > 0 && query_len > options.max_query_length {
        report.push(
            Issue::error(
                IssueCode::OutputBudgetExceeded,
                format!(
                    "rendered query has {} characters, limit is {}",
                    query_len, options.max_query_length
                ),
            )
            .with_context("length", query_len)
            .with_context("max_query_length", options.max_query_length),
        );
        log_rejection(snapshot, &report, "output budget");
        let mut result = CompileResult::rejected(normalized, report, snapshot.snapshot_ref());
        result.trace = output.trace;
        return Ok(result);
    }

    info!(
        provenance = %snapshot.code,
        task_type = %snapshot.task_type,
        operation = %snapshot.operation,
        version = snapshot.version,
        duration_ms = started.elapsed().as_millis() as u64,
        query_len,
        warnings = report.warnings.len(),
        "compiled expression"
    );

    Ok(CompileResult {
        query: output.query,
        params: output.params,
        normalized,
        report,
        snapshot: snapshot.snapshot_ref(),
        trace: output.trace,
    })
}

fn log_rejection(snapshot: &ProvenanceSnapshot, report: &ValidationReport, stage: &str) {
    warn!(
        provenance = %snapshot.code,
        operation = %snapshot.operation,
        stage,
        errors = report.errors.len(),
        first = report.errors.first().map(|i| i.code.as_str()).unwrap_or_default(),
        "compilation rejected"
    );
}
