//! Value-distribution skew of a column.
//!
//! Partitioning on a skewed column concentrates most rows in a few
//! partitions. The skew factor multiplies the composite score and decreases
//! monotonically with the concentration of the column's histogram:
//!
//! ```text
//! factor = 1 - (1 - min_factor) * concentration      concentration in [0, 1]
//! ```

use serde::{Deserialize, Serialize};

use super::traits::ColumnFactor;
use super::types::{FactorBounds, FactorValue};
use crate::core::catalog::{ColumnDescriptor, TableDescriptor, ValueHistogram};

/// Concentration statistic used by [`DistributionAnalyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkewStatistic {
    /// Share of rows held by the `k` most frequent values, normalised so that
    /// a uniform histogram scores 0 and a single dominant value scores 1.
    TopKShare { k: usize },
    /// Normalised Gini coefficient of the value frequencies.
    Gini,
}

impl Default for SkewStatistic {
    fn default() -> Self {
        Self::TopKShare { k: 3 }
    }
}

/// Configuration for [`DistributionAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewConfig {
    pub statistic: SkewStatistic,
    /// Factor of a fully concentrated histogram.
    pub min_factor: f64,
    /// Factor used when no histogram is available.
    pub neutral: f64,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            statistic: SkewStatistic::default(),
            min_factor: 0.1,
            neutral: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DistributionAnalyzer {
    config: SkewConfig,
}

impl DistributionAnalyzer {
    pub fn new(config: SkewConfig) -> Self {
        Self { config }
    }

    /// Concentration of `histogram` in `[0, 1]`, or `None` when it is empty.
    pub fn concentration(&self, histogram: &ValueHistogram) -> Option<f64> {
        if histogram.total() == 0 {
            return None;
        }
        let n = histogram.len();
        if n == 1 {
            return Some(1.0);
        }
        let value = match self.config.statistic {
            SkewStatistic::TopKShare { k } => top_k_concentration(histogram, k),
            SkewStatistic::Gini => gini_concentration(histogram),
        };
        Some(value.clamp(0.0, 1.0))
    }

    pub fn factor(&self, histogram: Option<&ValueHistogram>) -> FactorValue {
        match histogram.and_then(|h| self.concentration(h)) {
            Some(concentration) => {
                let value = 1.0 - (1.0 - self.config.min_factor) * concentration;
                FactorValue::measured(self.bounds().clamp(value))
            }
            None => FactorValue::neutral(self.config.neutral),
        }
    }
}

/// With `n` values the top `k` would hold `k / n` of the rows if the
/// histogram were uniform. `k` is capped at `n - 1` so the statistic stays
/// informative for histograms with few values.
fn top_k_concentration(histogram: &ValueHistogram, k: usize) -> f64 {
    let n = histogram.len();
    let k = k.clamp(1, n - 1);
    let uniform = k as f64 / n as f64;
    let share = histogram.top_k_share(k);
    (share - uniform) / (1.0 - uniform)
}

fn gini_concentration(histogram: &ValueHistogram) -> f64 {
    let n = histogram.len() as f64;
    let total = histogram.total() as f64;
    // Buckets are sorted descending; the Gini sum wants ascending ranks.
    let weighted: f64 = histogram
        .buckets()
        .iter()
        .rev()
        .enumerate()
        .map(|(i, b)| (2.0 * (i as f64 + 1.0) - n - 1.0) * b.count as f64)
        .sum();
    let gini = weighted / (n * total);
    gini * n / (n - 1.0)
}

impl ColumnFactor for DistributionAnalyzer {
    fn name(&self) -> &str {
        "skew"
    }

    fn bounds(&self) -> FactorBounds {
        FactorBounds::new(self.config.min_factor, 1.0)
    }

    fn neutral(&self) -> f64 {
        self.config.neutral
    }

    fn compute(&self, column: &ColumnDescriptor, _table: &TableDescriptor) -> FactorValue {
        self.factor(column.histogram.as_ref())
    }
}
