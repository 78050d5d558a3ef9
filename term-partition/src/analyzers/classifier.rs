//! Interactive vs. batch query classification.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::query::QueryRecord;

/// Label attached to every query of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Interactive,
    Batch,
}

/// Configuration for [`QueryClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Queries finishing strictly faster than this are interactive.
    pub interactive_threshold_ms: u64,
    /// Also label queries with a `LIMIT` clause as interactive.
    pub limit_hint: bool,
    /// Resource weight of an interactive query.
    pub interactive_weight: f64,
    /// Resource weight of a batch query.
    pub batch_weight: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            interactive_threshold_ms: 10_000,
            limit_hint: false,
            interactive_weight: 2.0,
            batch_weight: 1.0,
        }
    }
}

impl ClassifierConfig {
    pub fn interactive_threshold(&self) -> Duration {
        Duration::from_millis(self.interactive_threshold_ms)
    }
}

static LIMIT_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)\blimit\s+\d+").expect("Hard-coded regex pattern should be valid")
});

/// Labels queries interactive or batch and supplies their resource weights.
#[derive(Debug, Clone, Default)]
pub struct QueryClassifier {
    config: ClassifierConfig,
}

impl QueryClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, query: &QueryRecord) -> QueryKind {
        if query.execution_time < self.config.interactive_threshold() {
            return QueryKind::Interactive;
        }
        if self.config.limit_hint && LIMIT_CLAUSE.is_match(&query.sql) {
            return QueryKind::Interactive;
        }
        QueryKind::Batch
    }

    pub fn weight(&self, kind: QueryKind) -> f64 {
        match kind {
            QueryKind::Interactive => self.config.interactive_weight,
            QueryKind::Batch => self.config.batch_weight,
        }
    }
}
