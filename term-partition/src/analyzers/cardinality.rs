//! Cardinality suitability of a column as a partition key.
//!
//! A good partition column splits a table into enough partitions to prune
//! effectively but not so many that each one holds a handful of rows. The
//! factor is 1.0 while `distinct / rows` lies inside a configurable band and
//! decays as a Gaussian in log10 space outside it. The decay below the band is
//! steeper than above it: too few partitions give little pruning, while too
//! many can still be tamed by bucketing.

use serde::{Deserialize, Serialize};

use super::traits::ColumnFactor;
use super::types::{FactorBounds, FactorValue};
use crate::core::catalog::{ColumnDescriptor, TableDescriptor};

const BOUNDS: FactorBounds = FactorBounds::new(0.0, 1.0);

/// Configuration for [`CardinalityAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardinalityConfig {
    /// Lower edge of the partition-friendly `distinct / rows` band.
    pub band_low: f64,
    /// Upper edge of the band.
    pub band_high: f64,
    /// Gaussian width (in decades) of the decay below the band.
    pub low_side_width: f64,
    /// Gaussian width (in decades) of the decay above the band.
    pub high_side_width: f64,
    /// Factor used when the distinct or row count is missing or zero.
    pub neutral: f64,
}

impl Default for CardinalityConfig {
    fn default() -> Self {
        Self {
            band_low: 1e-4,
            band_high: 1e-2,
            low_side_width: 0.5,
            high_side_width: 1.5,
            neutral: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CardinalityAnalyzer {
    config: CardinalityConfig,
}

impl CardinalityAnalyzer {
    pub fn new(config: CardinalityConfig) -> Self {
        Self { config }
    }

    /// Factor for a column with `distinct` values in a table of `rows` rows.
    pub fn factor(&self, distinct: Option<u64>, rows: Option<u64>) -> FactorValue {
        let (distinct, rows) = match (distinct, rows) {
            (Some(d), Some(r)) if d > 0 && r > 0 => (d as f64, r as f64),
            _ => return FactorValue::neutral(self.config.neutral),
        };

        // Approximate distinct counts can exceed the row count.
        let ratio = (distinct / rows).min(1.0);
        let log_ratio = ratio.log10();
        let low = self.config.band_low.log10();
        let high = self.config.band_high.log10();

        let value = if log_ratio < low {
            gaussian(low - log_ratio, self.config.low_side_width)
        } else if log_ratio > high {
            gaussian(log_ratio - high, self.config.high_side_width)
        } else {
            1.0
        };
        FactorValue::measured(BOUNDS.clamp(value))
    }
}

fn gaussian(distance: f64, width: f64) -> f64 {
    (-(distance * distance) / (2.0 * width * width)).exp()
}

impl ColumnFactor for CardinalityAnalyzer {
    fn name(&self) -> &str {
        "cardinality"
    }

    fn bounds(&self) -> FactorBounds {
        BOUNDS
    }

    fn neutral(&self) -> f64 {
        self.config.neutral
    }

    fn compute(&self, column: &ColumnDescriptor, table: &TableDescriptor) -> FactorValue {
        let rows = table.row_count.or_else(|| {
            column
                .histogram
                .as_ref()
                .map(|h| h.total())
                .filter(|total| *total > 0)
        });
        self.factor(column.distinct_count, rows)
    }
}
