//! Configuration types for the compiler.

use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompilerResult};

/// Per-request compile options.
///
/// Every field has a default, so options can be passed as partial JSON:
///
/// ```rust
/// use litquery_compiler::CompileOptions;
///
/// let options: CompileOptions = serde_json::from_str(r#"{"strict": true}"#).unwrap();
/// assert!(options.strict);
/// assert_eq!(options.timezone, "UTC");
///
/// let built = CompileOptions::builder()
///     .with_max_query_length(2048)
///     .with_timezone("+08:00")
///     .with_trace(true)
///     .build();
/// assert_eq!(built.max_query_length, 2048);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Reject ambiguous normalization shapes and escalate soft bound violations.
    pub strict: bool,
    /// Maximum rendered query length in characters (0 = unbounded).
    pub max_query_length: usize,
    /// Timezone for naive date-time literals: `UTC`, `Z` or `±HH:MM`.
    pub timezone: String,
    /// Record every rule application in a render trace.
    pub trace_enabled: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_query_length: 0,
            timezone: "UTC".to_string(),
            trace_enabled: false,
        }
    }
}

impl CompileOptions {
    /// Creates a new builder for CompileOptions.
    pub fn builder() -> CompileOptionsBuilder {
        CompileOptionsBuilder::default()
    }

    /// Resolves the timezone option to a fixed UTC offset.
    pub fn utc_offset(&self) -> CompilerResult<FixedOffset> {
        parse_timezone(&self.timezone)
    }
}

/// Builder for CompileOptions.
#[derive(Debug, Clone, Default)]
pub struct CompileOptionsBuilder {
    options: CompileOptions,
}

impl CompileOptionsBuilder {
    /// Enables or disables strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Sets the maximum rendered query length.
    pub fn with_max_query_length(mut self, max: usize) -> Self {
        self.options.max_query_length = max;
        self
    }

    /// Sets the timezone used for naive date-times.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.options.timezone = timezone.into();
        self
    }

    /// Enables or disables the render trace.
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.options.trace_enabled = enabled;
        self
    }

    /// Builds the CompileOptions.
    pub fn build(self) -> CompileOptions {
        self.options
    }
}

/// Configuration of a [`QueryCompiler`](crate::QueryCompiler).
///
/// # Example
///
/// ```rust
/// use litquery_compiler::{CompileOptions, CompilerConfig};
/// use std::time::Duration;
///
/// let config = CompilerConfig::builder()
///     .with_default_options(CompileOptions::builder().with_strict(true).build())
///     .with_snapshot_deadline(Duration::from_millis(500))
///     .build();
/// assert!(config.default_options.strict);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Options used when a request carries none.
    pub default_options: CompileOptions,
    /// Maximum time a snapshot load may take (None = no deadline).
    ///
    /// Checked once the fetch returns: a slow load is rejected, but a fetch
    /// that never returns is not interrupted. Sources bound their own I/O
    /// and report [`SourceError::Timeout`](crate::SourceError::Timeout).
    pub snapshot_deadline: Option<Duration>,
}

impl CompilerConfig {
    /// Creates a new builder for CompilerConfig.
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }
}

/// Builder for CompilerConfig.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfigBuilder {
    default_options: CompileOptions,
    snapshot_deadline: Option<Duration>,
}

impl CompilerConfigBuilder {
    /// Sets the default compile options.
    pub fn with_default_options(mut self, options: CompileOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Sets the snapshot load deadline.
    pub fn with_snapshot_deadline(mut self, deadline: Duration) -> Self {
        self.snapshot_deadline = Some(deadline);
        self
    }

    /// Builds the CompilerConfig.
    pub fn build(self) -> CompilerConfig {
        CompilerConfig {
            default_options: self.default_options,
            snapshot_deadline: self.snapshot_deadline,
        }
    }
}

/// Parses `UTC`, `Z` or a `±HH:MM` offset.
pub fn parse_timezone(input: &str) -> CompilerResult<FixedOffset> {
    let invalid = || CompileError::InvalidConfig(format!("unsupported timezone '{}'", input));
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("UTC") || trimmed == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let bytes = trimmed.as_bytes();
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if bytes.len() != 6 || bytes[3] != b':' || !digits(1..3) || !digits(4..6) {
        return Err(invalid());
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(invalid()),
    };
    let hours: i32 = trimmed[1..3].parse().map_err(|_| invalid())?;
    let minutes: i32 = trimmed[4..6].parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options_default() {
        let options = CompileOptions::default();
        assert!(!options.strict);
        assert_eq!(options.max_query_length, 0);
        assert_eq!(options.timezone, "UTC");
        assert!(!options.trace_enabled);
    }

    #[test]
    fn test_compile_options_partial_json() {
        let options: CompileOptions =
            serde_json::from_str(r#"{"max_query_length": 100, "trace_enabled": true}"#).unwrap();
        assert_eq!(options.max_query_length, 100);
        assert!(options.trace_enabled);
        assert!(!options.strict);
        assert_eq!(options.timezone, "UTC");
    }

    #[test]
    fn test_compile_options_builder() {
        let options = CompileOptions::builder()
            .with_strict(true)
            .with_max_query_length(10)
            .with_timezone("-05:00")
            .with_trace(true)
            .build();
        assert!(options.strict);
        assert_eq!(options.max_query_length, 10);
        assert_eq!(options.utc_offset().unwrap().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_compiler_config_builder() {
        let config = CompilerConfig::builder()
            .with_snapshot_deadline(Duration::from_secs(2))
            .build();
        assert_eq!(config.snapshot_deadline, Some(Duration::from_secs(2)));
        assert_eq!(config.default_options, CompileOptions::default());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("+08:00").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_timezone("-03:30").unwrap().local_minus_utc(), -(3 * 3600 + 1800));
    }

    #[test]
    fn test_parse_timezone_rejects() {
        for bad in ["Europe/Berlin", "+8", "+24:00", "08:00", "+08-00", ""] {
            let err = parse_timezone(bad).unwrap_err();
            assert!(matches!(err, CompileError::InvalidConfig(_)), "{}", bad);
        }
    }
}
