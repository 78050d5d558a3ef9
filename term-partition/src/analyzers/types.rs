//! Factor values shared by the per-column analyzers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a factor value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorSource {
    /// Computed from observed statistics.
    Measured,
    /// The statistic was missing or empty, so the neutral default was used.
    Neutral,
}

/// One bounded factor of a column's composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorValue {
    pub value: f64,
    pub source: FactorSource,
}

impl FactorValue {
    pub fn measured(value: f64) -> Self {
        Self {
            value,
            source: FactorSource::Measured,
        }
    }

    pub fn neutral(value: f64) -> Self {
        Self {
            value,
            source: FactorSource::Neutral,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.source == FactorSource::Neutral
    }
}

impl fmt::Display for FactorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            FactorSource::Measured => write!(f, "{:.3}", self.value),
            FactorSource::Neutral => write!(f, "{:.3} (neutral)", self.value),
        }
    }
}

/// Closed interval a factor is guaranteed to stay within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorBounds {
    pub min: f64,
    pub max: f64,
}

impl FactorBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamps `value` into the bounds. NaN maps to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}
