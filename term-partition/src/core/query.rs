//! Query-log records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::names::normalize_qualified;

/// One row of the query log: the SQL text plus its execution metrics.
///
/// Records are immutable once built; the `with_*` methods consume and return
/// the record so a log reader can assemble one fluently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub sql: String,
    pub execution_time: Duration,
    pub cpu_time: Duration,
    pub peak_memory_bytes: u64,
    /// Bytes scanned, when the engine reports it.
    pub input_bytes: Option<u64>,
    /// Tables the engine reported the query as reading, normalised.
    pub target_tables: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl QueryRecord {
    pub fn new(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sql: sql.into(),
            execution_time: Duration::ZERO,
            cpu_time: Duration::ZERO,
            peak_memory_bytes: 0,
            input_bytes: None,
            target_tables: Vec::new(),
            created_at: None,
        }
    }

    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = execution_time;
        self
    }

    pub fn with_cpu_time(mut self, cpu_time: Duration) -> Self {
        self.cpu_time = cpu_time;
        self
    }

    pub fn with_peak_memory(mut self, bytes: u64) -> Self {
        self.peak_memory_bytes = bytes;
        self
    }

    pub fn with_input_bytes(mut self, bytes: u64) -> Self {
        self.input_bytes = Some(bytes);
        self
    }

    pub fn with_target_table(mut self, table: impl AsRef<str>) -> Self {
        let table = normalize_qualified(table.as_ref());
        if !self.target_tables.contains(&table) {
            self.target_tables.push(table);
        }
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}
