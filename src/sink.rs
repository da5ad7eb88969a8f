//! Destinations for finished log lines.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, TraceError};

/// Receives one finished line body per flushed statement.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str) -> Result<()>;
}

/// Appends lines to a file, reopening it for every write.
///
/// Each line is prefixed with the local wall-clock time and the short name of
/// the traced process, so several processes can share one log file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    process_name: String,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let program = std::env::args_os().next().unwrap_or_default();
        Self::with_process_name(path, program_short_name(&program))
    }

    pub fn with_process_name(path: impl Into<PathBuf>, process_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            process_name: process_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }
}

impl LogSink for FileSink {
    fn write_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TraceError::log_write(&self.path, e))?;

        let time = chrono::Local::now().format("%H:%M:%S");
        // One write call per line keeps concurrent appenders from interleaving.
        let record = format!("{time} {} {line}\n", self.process_name);
        file.write_all(record.as_bytes())
            .map_err(|e| TraceError::log_write(&self.path, e))
    }
}

/// Keeps line bodies in memory, unprefixed.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
        Ok(())
    }
}

/// [`process_short_name`] for a program path that may not be valid UTF-8.
pub fn program_short_name(program: &OsStr) -> String {
    process_short_name(&format!("\"{}\"", program.to_string_lossy()))
}

/// Short, lowercase program name taken from a command line.
///
/// A quoted executable path wins over whitespace splitting. An option switch
/// glued to the executable (`app.exe/opt`) is cut off. Any Excel flavour is
/// reported simply as `excel`.
pub fn process_short_name(command_line: &str) -> String {
    let trimmed = command_line.trim_start();
    let program = match trimmed.strip_prefix('"') {
        Some(rest) => rest.split('"').next().unwrap_or(rest),
        None => trimmed.split_whitespace().next().unwrap_or(""),
    };

    let mut program = program.to_lowercase();
    if let Some(at) = program.find(".exe/") {
        program.truncate(at + ".exe".len());
    }
    if program.contains("excel") {
        return "excel".to_string();
    }

    let file_name = program.rsplit(['/', '\\']).next().unwrap_or("");
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}
