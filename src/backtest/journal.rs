//! Per-run diagnostic journal.
//!
//! Every abandoned trade attempt leaves one entry naming what was being
//! sought and over which interval. The journal is owned by a single engine
//! run and returned with its artifacts; runs never share one.

use chrono::NaiveDate;
use serde::Serialize;

/// Why one trade attempt produced no trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub symbol: String,
    pub reason: String,
    pub call_expiry: Option<NaiveDate>,
    pub put_expiry: Option<NaiveDate>,
    pub future_expiry: Option<NaiveDate>,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl LogEntry {
    pub fn new(
        symbol: impl Into<String>,
        reason: impl Into<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            reason: reason.into(),
            call_expiry: None,
            put_expiry: None,
            future_expiry: None,
            from,
            to,
        }
    }
}

/// Accumulates log entries for one run, in encounter order.
#[derive(Debug, Default)]
pub struct RunJournal {
    entries: Vec<LogEntry>,
}

impl RunJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
