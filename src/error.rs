//! Error types for the tracer.
//!
//! None of these ever reach the traced application: the FFI layer swallows
//! them after logging, so a failing trace only means a missing log line.

use std::path::PathBuf;

use thiserror::Error;

use crate::call::FunctionId;

/// Errors raised inside the tracing core.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to append to trace log {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{function} call already holds {max} arguments")]
    TooManyArguments { function: FunctionId, max: usize },

    #[error("unknown ODBC function name: {0}")]
    UnknownFunction(String),
}

impl TraceError {
    /// Wrap an I/O error raised while writing to `path`.
    pub fn log_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LogWrite {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TraceError>;
