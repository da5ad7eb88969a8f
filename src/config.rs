//! Configuration for tracing behavior.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::aggregator::DEFAULT_TOTAL_THRESHOLD;
use crate::call::FunctionId;
use crate::error::Result;

/// Substring in the log file path that turns row counting off ("no count").
pub const NO_COUNT_MARKER: &str = "_nc";

/// Configuration options for a tracing session.
///
/// # Example
///
/// ```rust
/// use odbc_call_tracer::{FunctionId, TraceConfig};
///
/// let config = TraceConfig::from_log_path("/var/log/odbc_nc.log")
///     .with_function_logging(FunctionId::MoreResults, false);
///
/// assert!(!config.record_row_counts);
/// assert!(!config.logs_function(FunctionId::MoreResults));
/// ```
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// File the summary lines are appended to.
    pub log_file: PathBuf,

    /// Whether fetched rows are counted and written as `<n> Recs`.
    /// Default: `true`
    pub record_row_counts: bool,

    /// Cumulative row count that triggers a `(<n> Total)` suffix.
    /// Default: 500,000
    pub total_threshold: u64,

    /// Functions whose calls are not registered at all.
    pub disabled_functions: HashSet<FunctionId>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("odbctrace.log"),
            record_row_counts: true,
            total_threshold: DEFAULT_TOTAL_THRESHOLD,
            disabled_functions: HashSet::new(),
        }
    }
}

impl TraceConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the path handed over by the driver manager.
    ///
    /// Row counting is disabled when the path contains [`NO_COUNT_MARKER`].
    pub fn from_log_path(path: impl Into<PathBuf>) -> Self {
        let log_file = path.into();
        let record_row_counts = !log_file.to_string_lossy().contains(NO_COUNT_MARKER);
        Self {
            log_file,
            record_row_counts,
            ..Self::default()
        }
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Enable or disable row count recording.
    pub fn with_row_count_recording(mut self, enabled: bool) -> Self {
        self.record_row_counts = enabled;
        self
    }

    pub fn with_total_threshold(mut self, threshold: u64) -> Self {
        self.total_threshold = threshold;
        self
    }

    /// Switch tracing of a single function on or off.
    ///
    /// A switched-off function is invisible to the aggregator: it neither
    /// counts rows nor clears the pending statement.
    pub fn with_function_logging(mut self, function: FunctionId, enabled: bool) -> Self {
        if enabled {
            self.disabled_functions.remove(&function);
        } else {
            self.disabled_functions.insert(function);
        }
        self
    }

    /// [`with_function_logging`](Self::with_function_logging) by ODBC name,
    /// e.g. `"SQLFetch"` or `"SQLPrepareW"`.
    pub fn with_function_logging_by_name(self, name: &str, enabled: bool) -> Result<Self> {
        let function = name.parse::<FunctionId>()?;
        Ok(self.with_function_logging(function, enabled))
    }

    pub fn logs_function(&self, function: FunctionId) -> bool {
        !self.disabled_functions.contains(&function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TraceConfig::default();
        assert!(config.record_row_counts);
        assert_eq!(config.total_threshold, 500_000);
        assert!(config.logs_function(FunctionId::Fetch));
    }

    #[test]
    fn test_no_count_marker() {
        assert!(TraceConfig::from_log_path(r"C:\logs\odbc.log").record_row_counts);
        assert!(!TraceConfig::from_log_path(r"C:\logs\odbc_nc.log").record_row_counts);
        assert!(!TraceConfig::from_log_path("/tmp/trace_nc/sql.log").record_row_counts);
    }

    #[test]
    fn test_builder() {
        let config = TraceConfig::new()
            .with_log_file("/tmp/a.log")
            .with_row_count_recording(false)
            .with_total_threshold(10)
            .with_function_logging(FunctionId::Fetch, false);

        assert_eq!(config.log_file, PathBuf::from("/tmp/a.log"));
        assert!(!config.record_row_counts);
        assert_eq!(config.total_threshold, 10);
        assert!(!config.logs_function(FunctionId::Fetch));

        let config = config.with_function_logging(FunctionId::Fetch, true);
        assert!(config.logs_function(FunctionId::Fetch));
    }

    #[test]
    fn test_function_logging_by_name() {
        let config = TraceConfig::new()
            .with_function_logging_by_name("SQLFetchW", false)
            .unwrap();
        assert!(!config.logs_function(FunctionId::Fetch));
        assert!(config.logs_function(FunctionId::Prepare));

        let err = TraceConfig::new()
            .with_function_logging_by_name("SQLTables", false)
            .unwrap_err();
        assert!(matches!(err, crate::error::TraceError::UnknownFunction(ref name) if name == "SQLTables"));
    }
}
