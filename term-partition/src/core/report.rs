//! Results of an advisor run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzers::scoring::ColumnScore;
use crate::analyzers::usage::UsageSummary;
use crate::error::Result;
use crate::recommend::PartitionRecommendation;

/// Corpus-wide extraction counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_queries: usize,
    pub parsed: usize,
    pub parse_failures: usize,
    /// Column references no single base table could be found for.
    pub unresolved_references: usize,
}

impl ExtractionStats {
    /// Share of queries that parsed, 1.0 for an empty corpus.
    pub fn parse_rate(&self) -> f64 {
        if self.total_queries == 0 {
            1.0
        } else {
            self.parsed as f64 / self.total_queries as f64
        }
    }
}

/// Non-fatal conditions met while analysing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiagnostics {
    /// Parsed queries that read the table.
    pub query_count: usize,
    /// Queries reported against the table that failed to parse.
    pub parse_failures: usize,
    pub unresolved_references: usize,
    /// True when no query resolved a reference to the table.
    pub empty_corpus: bool,
}

/// Everything computed for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAnalysis {
    pub table: String,
    pub usage: UsageSummary,
    /// Scores of every catalog column, best first.
    pub scores: Vec<ColumnScore>,
    pub recommendation: PartitionRecommendation,
    pub diagnostics: TableDiagnostics,
}

/// A table whose analysis failed. Other tables are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub crate_version: String,
}

impl ReportMetadata {
    pub(crate) fn started_now() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Output of [`PartitionAdvisor::run`](super::PartitionAdvisor::run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReport {
    /// Per-table results in table-name order.
    pub tables: Vec<TableAnalysis>,
    pub stats: ExtractionStats,
    pub failures: Vec<TableFailure>,
    pub metadata: ReportMetadata,
}

impl AdvisorReport {
    pub fn table(&self, name: &str) -> Option<&TableAnalysis> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn recommendations(&self) -> impl Iterator<Item = &PartitionRecommendation> {
        self.tables.iter().map(|t| &t.recommendation)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Concatenated DDL of every table, in table order.
    pub fn to_ddl(&self) -> String {
        self.recommendations()
            .map(PartitionRecommendation::to_ddl)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
