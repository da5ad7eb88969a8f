//! Turns completed calls into log lines.
//!
//! The only state that matters is the pending statement: a prepare or
//! execute-direct arms it, a terminal call (free-statement, more-results,
//! close-cursor) flushes it as one line. Fetches only bump row counters.

use std::time::Instant;

use crate::call::{CallRecord, FunctionId};
use crate::parser::{collapse_line_breaks, StatementSummary};

/// Cumulative row count at which a `(<n> Total)` suffix is written.
pub const DEFAULT_TOTAL_THRESHOLD: u64 = 500_000;

/// Format `value` with a comma every three digits from the right.
pub fn group_thousands(value: u64) -> String {
    let mut digits = value.to_string();
    let mut i = digits.len().saturating_sub(3);
    while i > 0 {
        digits.insert(i, ',');
        i = i.saturating_sub(3);
    }
    digits
}

#[derive(Debug, Clone)]
struct PendingStatement {
    text: String,
    started: Instant,
}

/// Process-wide statement and row-count state.
#[derive(Debug)]
pub struct TraceAggregator {
    record_row_counts: bool,
    total_threshold: u64,
    pid: u32,
    pending: Option<PendingStatement>,
    current_rows: u64,
    cumulative_rows: u64,
    lifetime_rows: u64,
}

impl TraceAggregator {
    pub fn new(record_row_counts: bool, total_threshold: u64) -> Self {
        Self {
            record_row_counts,
            total_threshold,
            pid: std::process::id(),
            pending: None,
            current_rows: 0,
            cumulative_rows: 0,
            lifetime_rows: 0,
        }
    }

    /// Consume a completed call, returning the line body to write if any.
    pub fn consume(&mut self, call: &CallRecord) -> Option<String> {
        self.consume_at(call, Instant::now())
    }

    /// [`consume`](Self::consume) with an explicit clock reading.
    pub fn consume_at(&mut self, call: &CallRecord, now: Instant) -> Option<String> {
        match call.function {
            FunctionId::Fetch => {
                if self.record_row_counts
                    && call.return_code.is_some_and(|rc| rc.is_strict_success())
                {
                    self.current_rows += 1;
                    self.cumulative_rows += 1;
                    self.lifetime_rows += 1;
                }
                return None;
            }
            function if function.is_terminal() => {
                let pending = self.pending.take()?;
                return Some(self.flush(pending, now));
            }
            FunctionId::Prepare => {
                let text = call.arguments().iter().find_map(|arg| arg.value.narrow_text());
                if let Some(text) = text {
                    self.arm(text.to_string(), now, call.function);
                    return None;
                }
            }
            FunctionId::ExecDirect => {
                let units = call.arguments().iter().find_map(|arg| arg.value.wide_text());
                if let Some(units) = units {
                    self.arm(String::from_utf16_lossy(units), now, call.function);
                    return None;
                }
            }
            _ => {}
        }

        self.pending = None;
        None
    }

    fn arm(&mut self, text: String, now: Instant, function: FunctionId) {
        // An empty statement is indistinguishable from no statement.
        if text.is_empty() {
            self.pending = None;
            return;
        }

        let summary = StatementSummary::parse(&text);
        tracing::debug!(
            function = %function,
            db.operation = %summary.operation,
            db.sql.table = summary.table.as_deref().unwrap_or(""),
            "Statement armed"
        );
        self.pending = Some(PendingStatement { text, started: now });
    }

    fn flush(&mut self, pending: PendingStatement, now: Instant) -> String {
        let elapsed_ms = now.saturating_duration_since(pending.started).as_millis() as u64;
        let mut line = format!("{} {}ms ", self.pid, group_thousands(elapsed_ms));

        if self.record_row_counts {
            line.push_str(&group_thousands(self.current_rows));
            line.push_str(" Recs ");
            self.current_rows = 0;

            if self.cumulative_rows >= self.total_threshold {
                line.push('(');
                line.push_str(&group_thousands(self.cumulative_rows));
                line.push_str(" Total) ");
                self.cumulative_rows = 0;
            }
        }

        line.push_str(&collapse_line_breaks(&pending.text));
        tracing::debug!(elapsed_ms, "Statement flushed");
        line
    }

    /// Text of the armed statement, if any.
    pub fn pending_statement(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.text.as_str())
    }

    /// Rows fetched since the last terminal call.
    pub fn current_rows(&self) -> u64 {
        self.current_rows
    }

    /// Rows fetched since the last `(<n> Total)` line.
    pub fn cumulative_rows(&self) -> u64 {
        self.cumulative_rows
    }

    /// Rows fetched over the life of the aggregator.
    pub fn lifetime_rows(&self) -> u64 {
        self.lifetime_rows
    }

    pub fn records_row_counts(&self) -> bool {
        self.record_row_counts
    }
}
