//! Resource impact of the queries touching each column.
//!
//! Every query gets a resource score in `[0, 1]`: a weighted sum of its
//! execution time, CPU time, scanned bytes and peak memory, each normalised by
//! the largest value of that metric in the table's corpus. Metrics that are
//! zero across the whole corpus drop out and the remaining weights are
//! renormalised. The score, multiplied by the query's class weight, is added
//! to every column the query touches; column totals are then mapped linearly
//! onto `[min_multiplier, max_multiplier]` with the highest-impact column at
//! the maximum.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::traits::AnalyzerState;
use super::types::{FactorBounds, FactorValue};
use crate::core::query::QueryRecord;
use crate::error::Result;

/// Multiplier given to every column when there is no resource signal.
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;

/// Relative weight of each execution metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub execution_time: f64,
    pub cpu_time: f64,
    pub input_bytes: f64,
    pub peak_memory: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            execution_time: 0.40,
            cpu_time: 0.30,
            input_bytes: 0.15,
            peak_memory: 0.15,
        }
    }
}

impl MetricWeights {
    pub fn total(&self) -> f64 {
        self.execution_time + self.cpu_time + self.input_bytes + self.peak_memory
    }
}

/// Configuration for [`ResourceImpactAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub weights: MetricWeights,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            weights: MetricWeights::default(),
            min_multiplier: 0.5,
            max_multiplier: 1.5,
        }
    }
}

/// Execution metrics of one query, as plain numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResources {
    pub execution_ms: f64,
    pub cpu_ms: f64,
    pub input_bytes: f64,
    pub peak_memory_bytes: f64,
}

impl QueryResources {
    fn max(self, other: Self) -> Self {
        Self {
            execution_ms: self.execution_ms.max(other.execution_ms),
            cpu_ms: self.cpu_ms.max(other.cpu_ms),
            input_bytes: self.input_bytes.max(other.input_bytes),
            peak_memory_bytes: self.peak_memory_bytes.max(other.peak_memory_bytes),
        }
    }

    /// Weighted, max-normalised score in `[0, 1]`.
    pub fn score(&self, maxima: &QueryResources, weights: &MetricWeights) -> f64 {
        let terms = [
            (self.execution_ms, maxima.execution_ms, weights.execution_time),
            (self.cpu_ms, maxima.cpu_ms, weights.cpu_time),
            (self.input_bytes, maxima.input_bytes, weights.input_bytes),
            (
                self.peak_memory_bytes,
                maxima.peak_memory_bytes,
                weights.peak_memory,
            ),
        ];
        let mut weighted = 0.0;
        let mut active_weight = 0.0;
        for (value, max, weight) in terms {
            if max > 0.0 {
                weighted += weight * (value / max);
                active_weight += weight;
            }
        }
        if active_weight > 0.0 {
            (weighted / active_weight).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl From<&QueryRecord> for QueryResources {
    fn from(query: &QueryRecord) -> Self {
        Self {
            execution_ms: query.execution_time.as_secs_f64() * 1000.0,
            cpu_ms: query.cpu_time.as_secs_f64() * 1000.0,
            input_bytes: query.input_bytes.unwrap_or(0) as f64,
            peak_memory_bytes: query.peak_memory_bytes as f64,
        }
    }
}

/// One query's resource contribution to a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub query_id: String,
    pub resources: QueryResources,
    /// Interactive/batch weight supplied by the classifier.
    pub class_weight: f64,
    /// Columns of the table the query touches.
    pub columns: BTreeSet<String>,
}

/// Partial resource aggregate: per-metric maxima plus the samples seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub maxima: QueryResources,
    pub samples: Vec<ResourceSample>,
}

impl ResourceState {
    pub fn from_sample(sample: ResourceSample) -> Self {
        Self {
            maxima: sample.resources,
            samples: vec![sample],
        }
    }
}

impl AnalyzerState for ResourceState {
    fn merge(states: Vec<Self>) -> Result<Self> {
        let mut merged = ResourceState::default();
        for state in states {
            merged.maxima = merged.maxima.max(state.maxima);
            merged.samples.extend(state.samples);
        }
        // Fixed summation order keeps the result independent of merge order.
        merged.samples.sort_by(|a, b| {
            a.query_id
                .cmp(&b.query_id)
                .then_with(|| a.columns.cmp(&b.columns))
                .then_with(|| a.class_weight.total_cmp(&b.class_weight))
                .then_with(|| a.resources.execution_ms.total_cmp(&b.resources.execution_ms))
                .then_with(|| a.resources.cpu_ms.total_cmp(&b.resources.cpu_ms))
                .then_with(|| a.resources.input_bytes.total_cmp(&b.resources.input_bytes))
                .then_with(|| {
                    a.resources
                        .peak_memory_bytes
                        .total_cmp(&b.resources.peak_memory_bytes)
                })
        });
        Ok(merged)
    }

    fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-column resource multipliers of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceImpact {
    /// Raw weighted impact per touched column.
    pub raw: BTreeMap<String, f64>,
    pub max_impact: f64,
    min_multiplier: f64,
    max_multiplier: f64,
}

impl ResourceImpact {
    /// Multiplier for `column`. Columns no query touched get the minimum;
    /// with no resource signal at all every column is neutral.
    pub fn multiplier(&self, column: &str) -> FactorValue {
        if self.max_impact <= 0.0 {
            return FactorValue::neutral(NEUTRAL_MULTIPLIER);
        }
        let impact = self.raw.get(column).copied().unwrap_or(0.0);
        let span = self.max_multiplier - self.min_multiplier;
        let value = self.min_multiplier + span * impact / self.max_impact;
        FactorValue::measured(
            FactorBounds::new(self.min_multiplier, self.max_multiplier).clamp(value),
        )
    }

    pub fn has_signal(&self) -> bool {
        self.max_impact > 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceImpactAnalyzer {
    config: ResourceConfig,
}

impl ResourceImpactAnalyzer {
    pub fn new(config: ResourceConfig) -> Self {
        Self { config }
    }

    pub fn bounds(&self) -> FactorBounds {
        FactorBounds::new(self.config.min_multiplier, self.config.max_multiplier)
    }

    #[instrument(skip_all, fields(samples = samples.len()))]
    pub fn analyze(&self, samples: Vec<ResourceSample>) -> Result<ResourceImpact> {
        let states = samples.into_iter().map(ResourceState::from_sample).collect();
        let state = ResourceState::merge(states)?;
        Ok(self.finish(&state))
    }

    /// Turns a merged state into per-column multipliers.
    pub fn finish(&self, state: &ResourceState) -> ResourceImpact {
        let mut raw: BTreeMap<String, f64> = BTreeMap::new();
        for sample in &state.samples {
            let score = sample.resources.score(&state.maxima, &self.config.weights);
            let impact = score * sample.class_weight;
            for column in &sample.columns {
                *raw.entry(column.clone()).or_default() += impact;
            }
        }
        let max_impact = raw.values().copied().fold(0.0, f64::max);
        debug!(columns = raw.len(), max_impact, "Computed resource impact");

        ResourceImpact {
            raw,
            max_impact,
            min_multiplier: self.config.min_multiplier,
            max_multiplier: self.config.max_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(id: &str, exec_ms: u64, weight: f64, columns: &[&str]) -> ResourceSample {
        let record = QueryRecord::new(id, "SELECT 1")
            .with_execution_time(Duration::from_millis(exec_ms))
            .with_cpu_time(Duration::from_millis(exec_ms))
            .with_peak_memory(exec_ms * 10);
        ResourceSample {
            query_id: id.to_string(),
            resources: QueryResources::from(&record),
            class_weight: weight,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_missing_metric_is_renormalised() {
        let weights = MetricWeights::default();
        let maxima = QueryResources {
            execution_ms: 100.0,
            cpu_ms: 100.0,
            input_bytes: 0.0,
            peak_memory_bytes: 100.0,
        };
        let at_max = maxima;
        assert!((at_max.score(&maxima, &weights) - 1.0).abs() < 1e-12);
        assert_eq!(QueryResources::default().score(&QueryResources::default(), &weights), 0.0);
    }

    #[test]
    fn test_highest_impact_column_gets_maximum() {
        let analyzer = ResourceImpactAnalyzer::default();
        let impact = analyzer
            .analyze(vec![
                sample("q1", 1000, 2.0, &["order_date", "status"]),
                sample("q2", 500, 1.0, &["order_date"]),
            ])
            .unwrap();

        assert_eq!(impact.multiplier("order_date").value, 1.5);
        let status = impact.multiplier("status").value;
        // q1 contributes 2.0 to both; order_date also gets 0.5 from q2.
        assert!((status - (0.5 + 2.0 / 2.5)).abs() < 1e-12);
        assert_eq!(impact.multiplier("amount").value, 0.5);
    }

    #[test]
    fn test_no_signal_is_neutral() {
        let analyzer = ResourceImpactAnalyzer::default();
        let empty = analyzer.analyze(Vec::new()).unwrap();
        assert!(empty.multiplier("order_date").is_neutral());

        let zero = analyzer
            .analyze(vec![sample("q1", 0, 2.0, &["order_date"])])
            .unwrap();
        assert!(!zero.has_signal());
        assert_eq!(zero.multiplier("order_date").value, NEUTRAL_MULTIPLIER);
    }

    #[test]
    fn test_merge_order_does_not_change_result() {
        let analyzer = ResourceImpactAnalyzer::default();
        let a = ResourceState::from_sample(sample("q1", 300, 1.0, &["a", "b"]));
        let b = ResourceState::from_sample(sample("q2", 700, 2.0, &["b"]));
        let c = ResourceState::from_sample(sample("q3", 100, 1.0, &["a"]));

        let left = ResourceState::merge(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let right = ResourceState::merge(vec![c, ResourceState::merge(vec![b, a]).unwrap()]).unwrap();
        assert_eq!(analyzer.finish(&left), analyzer.finish(&right));
    }

    #[test]
    fn test_duplicate_query_ids_merge_in_any_order() {
        let first = sample("q1", 300, 1.0, &["a"]);
        let second = sample("q1", 900, 2.0, &["a", "b"]);
        let third = sample("q1", 500, 2.0, &["a", "b"]);

        let forward = ResourceState::merge(vec![
            ResourceState::from_sample(first.clone()),
            ResourceState::from_sample(second.clone()),
            ResourceState::from_sample(third.clone()),
        ])
        .unwrap();
        let backward = ResourceState::merge(vec![
            ResourceState::from_sample(third),
            ResourceState::from_sample(second),
            ResourceState::from_sample(first),
        ])
        .unwrap();

        assert_eq!(forward, backward);
        let order: Vec<f64> = forward.samples.iter().map(|s| s.resources.execution_ms).collect();
        assert_eq!(order, vec![300.0, 500.0, 900.0]);
    }
}
