//! Per-column usage counts folded over a table's query corpus.
//!
//! Each query contributes at most one mention per column, whatever the number
//! of times the column appears in its text. The fold is expressed as
//! [`UsageState`] merges so per-query states can be combined in any order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::classifier::QueryKind;
use super::traits::AnalyzerState;
use crate::error::{Result, TermError};
use crate::sql::{ColumnRef, ExtractedColumns};

/// Column usage of one query, restricted to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryUsage {
    pub query_id: String,
    pub kind: QueryKind,
    pub referenced: BTreeSet<String>,
    pub join_columns: BTreeSet<String>,
    pub filter_columns: BTreeSet<String>,
}

impl QueryUsage {
    /// Keeps the columns of `extracted` resolved to `table`'s catalog name.
    pub fn from_extraction(
        query_id: impl Into<String>,
        kind: QueryKind,
        table: &str,
        extracted: &ExtractedColumns,
    ) -> Self {
        let pick = |set: &BTreeSet<ColumnRef>| -> BTreeSet<String> {
            set.iter()
                .filter(|c| c.table == table)
                .map(|c| c.column.clone())
                .collect()
        };
        let join_columns = pick(&extracted.join_columns);
        let filter_columns = pick(&extracted.filter_columns);
        let mut referenced = pick(&extracted.referenced);
        referenced.extend(join_columns.iter().cloned());
        referenced.extend(filter_columns.iter().cloned());

        Self {
            query_id: query_id.into(),
            kind,
            referenced,
            join_columns,
            filter_columns,
        }
    }

    pub fn is_predicate(&self, column: &str) -> bool {
        self.join_columns.contains(column) || self.filter_columns.contains(column)
    }
}

/// Usage counters of one column.
///
/// `predicate_mentions <= global_mentions` and
/// `interactive_mentions + batch_mentions == global_mentions` always hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnUsageStat {
    pub column: String,
    /// Queries referencing the column anywhere.
    pub global_mentions: u64,
    /// Queries using the column in a JOIN or WHERE predicate.
    pub predicate_mentions: u64,
    pub join_mentions: u64,
    pub filter_mentions: u64,
    pub interactive_mentions: u64,
    pub batch_mentions: u64,
}

impl ColumnUsageStat {
    fn add(&mut self, other: &ColumnUsageStat) {
        self.global_mentions += other.global_mentions;
        self.predicate_mentions += other.predicate_mentions;
        self.join_mentions += other.join_mentions;
        self.filter_mentions += other.filter_mentions;
        self.interactive_mentions += other.interactive_mentions;
        self.batch_mentions += other.batch_mentions;
    }
}

/// Partial usage aggregate over some subset of a table's queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageState {
    pub table: String,
    pub query_count: u64,
    pub stats: BTreeMap<String, ColumnUsageStat>,
}

impl UsageState {
    /// State holding a single query's contribution.
    pub fn from_query(table: impl Into<String>, usage: &QueryUsage) -> Self {
        let stats = usage
            .referenced
            .iter()
            .map(|column| {
                let predicate = usage.is_predicate(column);
                let stat = ColumnUsageStat {
                    column: column.clone(),
                    global_mentions: 1,
                    predicate_mentions: u64::from(predicate),
                    join_mentions: u64::from(usage.join_columns.contains(column)),
                    filter_mentions: u64::from(usage.filter_columns.contains(column)),
                    interactive_mentions: u64::from(usage.kind == QueryKind::Interactive),
                    batch_mentions: u64::from(usage.kind == QueryKind::Batch),
                };
                (column.clone(), stat)
            })
            .collect();
        Self {
            table: table.into(),
            query_count: 1,
            stats,
        }
    }
}

impl AnalyzerState for UsageState {
    fn merge(states: Vec<Self>) -> Result<Self> {
        let mut merged = UsageState::default();
        for state in states {
            if merged.table.is_empty() {
                merged.table = state.table.clone();
            } else if !state.table.is_empty() && state.table != merged.table {
                return Err(TermError::Internal(format!(
                    "cannot merge usage of '{}' into usage of '{}'",
                    state.table, merged.table
                )));
            }
            merged.query_count += state.query_count;
            for (column, stat) in &state.stats {
                merged
                    .stats
                    .entry(column.clone())
                    .or_insert_with(|| ColumnUsageStat {
                        column: column.clone(),
                        ..ColumnUsageStat::default()
                    })
                    .add(stat);
            }
        }
        Ok(merged)
    }

    fn is_empty(&self) -> bool {
        self.query_count == 0
    }
}

/// Frozen usage statistics of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub table: String,
    pub query_count: u64,
    pub stats: BTreeMap<String, ColumnUsageStat>,
    /// Largest global mention count over the table's columns.
    pub max_global: u64,
}

impl UsageSummary {
    pub fn stat(&self, column: &str) -> Option<&ColumnUsageStat> {
        self.stats.get(column)
    }

    /// True when no query of the corpus resolved a reference to this table.
    pub fn is_empty_corpus(&self) -> bool {
        self.max_global == 0
    }
}

impl From<UsageState> for UsageSummary {
    fn from(state: UsageState) -> Self {
        let max_global = state
            .stats
            .values()
            .map(|s| s.global_mentions)
            .max()
            .unwrap_or(0);
        Self {
            table: state.table,
            query_count: state.query_count,
            stats: state.stats,
            max_global,
        }
    }
}

/// Folds per-query usage into a table's [`UsageSummary`].
#[derive(Debug, Clone)]
pub struct UsageAggregator {
    table: String,
}

impl UsageAggregator {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    #[instrument(skip(self, queries), fields(table = %self.table, queries = queries.len()))]
    pub fn aggregate(&self, queries: &[QueryUsage]) -> Result<UsageSummary> {
        let states = queries
            .iter()
            .map(|usage| UsageState::from_query(self.table.clone(), usage))
            .collect();
        let mut state = UsageState::merge(states)?;
        state.table = self.table.clone();

        let summary = UsageSummary::from(state);
        debug!(
            columns = summary.stats.len(),
            max_global = summary.max_global,
            "Aggregated column usage"
        );
        Ok(summary)
    }
}
