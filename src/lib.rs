//! # odbc-call-tracer
//!
//! An ODBC trace library that writes one summary line per statement: how long it
//! ran and how many rows it returned, for every process that loads it.
//!
//! The driver manager calls a `TraceSQLxxx` export before each ODBC call and
//! `TraceReturn` after it. This crate keeps the in-flight calls in a fixed slot
//! table, matches each return to its call, and feeds the completed call to an
//! aggregator that tracks the current statement and its row count.
//!
//! ## Features
//!
//! - **Statement timing**: elapsed time from `SQLPrepare`/`SQLExecDirectW` to the
//!   closing `SQLFreeStmt`, `SQLMoreResults` or `SQLCloseCursor`
//! - **Row counts**: successful `SQLFetch` calls, plus a running total every 500,000 rows
//! - **Never in the way**: a full table, a missing log file or a panic only
//!   means a missing line, never a changed ODBC result
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use odbc_call_tracer::prelude::*;
//!
//! let tracer = Tracer::new();
//! let sink = Arc::new(MemorySink::new());
//! tracer.open_with_sink(TraceConfig::from_log_path("odbc.log"), sink.clone());
//!
//! let prepare = CallRecord::new(FunctionId::Prepare)
//!     .with_argument("szSqlStr", ArgValue::NarrowText(Some("SELECT * FROM t".into())));
//! let handle = tracer.trace_call(prepare);
//! tracer.trace_return(handle, SqlReturn::SUCCESS);
//!
//! for _ in 0..3 {
//!     let handle = tracer.trace_call(CallRecord::new(FunctionId::Fetch));
//!     tracer.trace_return(handle, SqlReturn::SUCCESS);
//! }
//!
//! let handle = tracer.trace_call(CallRecord::new(FunctionId::FreeStmt));
//! tracer.trace_return(handle, SqlReturn::SUCCESS);
//!
//! assert!(sink.lines()[0].ends_with("3 Recs SELECT * FROM t"));
//! ```
//!
//! ## Log Line Format
//!
//! ```text
//! <HH:MM:SS> <process> <pid> <elapsed>ms [<rows> Recs ] [(<total> Total) ]<statement>
//! ```
//!
//! Numbers are grouped with commas. Row fields are left out when the log file
//! path contains `_nc`. Line breaks inside the statement become single spaces.

mod aggregator;
mod call;
mod config;
mod error;
pub mod ffi;
mod parser;
mod registry;
mod sink;
mod tracer;

pub use aggregator::{group_thousands, TraceAggregator, DEFAULT_TOTAL_THRESHOLD};
pub use call::{
    ArgValue, CallRecord, FunctionId, HandleKind, SqlReturn, TraceArgument, MAX_ARGUMENTS,
};
pub use config::{TraceConfig, NO_COUNT_MARKER};
pub use error::{Result, TraceError};
pub use parser::{collapse_line_breaks, SqlOperation, StatementSummary};
pub use registry::{CallHandle, CallRegistry, DEFAULT_CAPACITY};
pub use sink::{process_short_name, program_short_name, FileSink, LogSink, MemorySink};
pub use tracer::Tracer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArgValue, CallHandle, CallRecord, FunctionId, LogSink, MemorySink, SqlReturn,
        TraceConfig, Tracer,
    };
}
