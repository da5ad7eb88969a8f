//! The tracing context shared by every intercepted entry point.

use std::sync::{Arc, Mutex, RwLock};

use crate::aggregator::TraceAggregator;
use crate::call::{CallRecord, SqlReturn};
use crate::config::TraceConfig;
use crate::registry::{CallHandle, CallRegistry};
use crate::sink::{FileSink, LogSink};

/// An open log destination plus the aggregation state feeding it.
struct Session {
    config: TraceConfig,
    sink: Arc<dyn LogSink>,
    aggregator: Mutex<TraceAggregator>,
}

/// Correlates intercepted calls with their returns and writes summary lines.
///
/// One instance lives for the whole process. Until [`open`](Self::open) is
/// called every operation is a no-op.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use odbc_call_tracer::{ArgValue, CallRecord, FunctionId, MemorySink, SqlReturn, TraceConfig, Tracer};
///
/// let tracer = Tracer::new();
/// let sink = Arc::new(MemorySink::new());
/// tracer.open_with_sink(TraceConfig::default().with_row_count_recording(false), sink.clone());
///
/// let prepare = CallRecord::new(FunctionId::Prepare)
///     .with_argument("szSqlStr", ArgValue::NarrowText(Some("SELECT 1".into())));
/// let handle = tracer.trace_call(prepare);
/// tracer.trace_return(handle, SqlReturn::SUCCESS);
///
/// let handle = tracer.trace_call(CallRecord::new(FunctionId::CloseCursor));
/// tracer.trace_return(handle, SqlReturn::SUCCESS);
///
/// assert!(sink.lines()[0].ends_with("ms SELECT 1"));
/// ```
pub struct Tracer {
    registry: CallRegistry,
    session: RwLock<Option<Arc<Session>>>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer {
    pub fn new() -> Self {
        Self::with_registry(CallRegistry::new())
    }

    pub fn with_registry(registry: CallRegistry) -> Self {
        Self {
            registry,
            session: RwLock::new(None),
        }
    }

    /// Start writing to the file named in `config`.
    pub fn open(&self, config: TraceConfig) {
        let sink = Arc::new(FileSink::new(&config.log_file));
        self.open_with_sink(config, sink);
    }

    /// Start a session writing to `sink`, replacing any previous session.
    pub fn open_with_sink(&self, config: TraceConfig, sink: Arc<dyn LogSink>) {
        tracing::debug!(
            log_file = %config.log_file.display(),
            record_row_counts = config.record_row_counts,
            "Opening trace session"
        );
        let aggregator = TraceAggregator::new(config.record_row_counts, config.total_threshold);
        let session = Session {
            config,
            sink,
            aggregator: Mutex::new(aggregator),
        };
        *self.session.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(session));
    }

    /// Stop tracing. Calls still in flight are dropped when they return.
    pub fn close(&self) {
        if self.session.write().unwrap_or_else(|p| p.into_inner()).take().is_some() {
            tracing::debug!("Trace session closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.current_session().is_some()
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        self.session.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Register an intercepted call.
    ///
    /// Returns [`CallHandle::INVALID`] when no session is open, the function is
    /// switched off, or the registry is full.
    pub fn trace_call(&self, record: CallRecord) -> CallHandle {
        let Some(session) = self.current_session() else {
            return CallHandle::INVALID;
        };
        if !session.config.logs_function(record.function) {
            return CallHandle::INVALID;
        }
        self.registry.register(record)
    }

    /// Complete the call registered under `handle` with its return code.
    pub fn trace_return(&self, handle: CallHandle, return_code: SqlReturn) {
        let Some(mut record) = self.registry.retrieve(handle) else {
            return;
        };
        record.return_code = Some(return_code);

        let Some(session) = self.current_session() else {
            return;
        };

        let line = session
            .aggregator
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .consume(&record);

        if let Some(line) = line {
            if let Err(e) = session.sink.write_line(&line) {
                tracing::warn!(error = %e, "Dropping trace line");
            }
        }
    }

    /// Run `f` against the aggregator of the open session.
    pub fn with_aggregator<T>(&self, f: impl FnOnce(&TraceAggregator) -> T) -> Option<T> {
        let session = self.current_session()?;
        let aggregator = session.aggregator.lock().unwrap_or_else(|p| p.into_inner());
        Some(f(&aggregator))
    }
}
