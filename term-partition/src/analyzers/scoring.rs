//! Composite scoring of a table's columns.
//!
//! ```text
//! composite = usage * cardinality * resource * skew
//!           + predicate_bonus * predicate_mentions / global_mentions
//! usage     = (global_mentions / max_global) ^ usage_exponent
//! ```
//!
//! When the table's corpus resolved no references at all, usage and
//! resource are both neutral (1.0) and the ranking rests on the catalog
//! statistics alone.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::cardinality::CardinalityAnalyzer;
use super::distribution::DistributionAnalyzer;
use super::resource::{ResourceImpact, NEUTRAL_MULTIPLIER};
use super::traits::ColumnFactor;
use super::types::FactorValue;
use super::usage::UsageSummary;
use crate::core::catalog::TableDescriptor;

/// Usage factor when the corpus holds no resolved reference to the table.
pub const NEUTRAL_USAGE: f64 = 1.0;

/// Weights of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Exponent applied to the normalised usage ratio.
    pub usage_exponent: f64,
    /// Weight of the predicate ratio added to the product of factors.
    pub predicate_bonus: f64,
    /// Columns scoring at or below this are never recommended.
    pub min_score: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            usage_exponent: 1.0,
            predicate_bonus: 0.2,
            min_score: 0.0,
        }
    }
}

/// Composite score of one column with the factors that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScore {
    pub table: String,
    pub column: String,
    pub composite: f64,
    pub usage: FactorValue,
    pub cardinality: FactorValue,
    pub resource: FactorValue,
    pub skew: FactorValue,
    /// `predicate_mentions / global_mentions`, 0 for unused columns.
    pub predicate_ratio: f64,
    pub global_mentions: u64,
    pub predicate_mentions: u64,
}

impl ColumnScore {
    /// Human-readable factor breakdown.
    pub fn evidence(&self) -> String {
        format!(
            "score {:.3} = usage {} x cardinality {} x resource {} x skew {} + predicate ratio {:.3} ({}/{} queries)",
            self.composite,
            self.usage,
            self.cardinality,
            self.resource,
            self.skew,
            self.predicate_ratio,
            self.predicate_mentions,
            self.global_mentions
        )
    }

    /// Whether this score clears the recommendation threshold. A composite
    /// equal to `min_score` does not.
    pub fn is_eligible(&self, min_score: f64) -> bool {
        self.composite > min_score
    }

    /// Ranking order: composite descending, then predicate mentions
    /// descending, then column name ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .composite
            .total_cmp(&self.composite)
            .then_with(|| other.predicate_mentions.cmp(&self.predicate_mentions))
            .then_with(|| self.column.cmp(&other.column))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    weights: ScoringWeights,
    cardinality: CardinalityAnalyzer,
    distribution: DistributionAnalyzer,
}

impl ScoringEngine {
    pub fn new(
        weights: ScoringWeights,
        cardinality: CardinalityAnalyzer,
        distribution: DistributionAnalyzer,
    ) -> Self {
        Self {
            weights,
            cardinality,
            distribution,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Upper bound of any composite this engine produces.
    pub fn max_composite(&self, resource_max: f64) -> f64 {
        resource_max.max(NEUTRAL_MULTIPLIER) + self.weights.predicate_bonus
    }

    /// Scores every catalog column of `table`, best first.
    #[instrument(skip_all, fields(table = %table.name))]
    pub fn score_table(
        &self,
        table: &TableDescriptor,
        usage: &UsageSummary,
        resources: &ResourceImpact,
    ) -> Vec<ColumnScore> {
        let empty_corpus = usage.is_empty_corpus();
        let mut scores: Vec<ColumnScore> = table
            .columns
            .iter()
            .map(|column| {
                let (global, predicate) = usage
                    .stat(&column.name)
                    .map(|s| (s.global_mentions, s.predicate_mentions))
                    .unwrap_or((0, 0));

                let (usage_factor, resource) = if empty_corpus {
                    (
                        FactorValue::neutral(NEUTRAL_USAGE),
                        FactorValue::neutral(NEUTRAL_MULTIPLIER),
                    )
                } else {
                    let ratio = global as f64 / usage.max_global as f64;
                    (
                        FactorValue::measured(ratio.powf(self.weights.usage_exponent)),
                        resources.multiplier(&column.name),
                    )
                };
                let cardinality = self.cardinality.compute(column, table);
                let skew = self.distribution.compute(column, table);
                let predicate_ratio = if global > 0 {
                    predicate as f64 / global as f64
                } else {
                    0.0
                };

                let composite = usage_factor.value * cardinality.value * resource.value * skew.value
                    + self.weights.predicate_bonus * predicate_ratio;

                ColumnScore {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    composite,
                    usage: usage_factor,
                    cardinality,
                    resource,
                    skew,
                    predicate_ratio,
                    global_mentions: global,
                    predicate_mentions: predicate,
                }
            })
            .collect();

        scores.sort_by(ColumnScore::rank_cmp);
        debug!(
            columns = scores.len(),
            empty_corpus,
            best = scores.first().map(|s| s.column.as_str()).unwrap_or(""),
            "Scored columns"
        );
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::classifier::QueryKind;
    use crate::analyzers::resource::{QueryResources, ResourceImpactAnalyzer, ResourceSample};
    use crate::analyzers::usage::{QueryUsage, UsageAggregator};
    use crate::core::catalog::{ColumnDescriptor, ValueHistogram};

    fn table() -> TableDescriptor {
        TableDescriptor::new("events")
            .with_row_count(1_000_000)
            .with_column(ColumnDescriptor::new("events", "a", "bigint").with_distinct_count(1_000))
            .with_column(ColumnDescriptor::new("events", "b", "bigint").with_distinct_count(1_000))
            .with_column(ColumnDescriptor::new("events", "c", "bigint").with_distinct_count(1_000))
    }

    fn usage(id: &str, referenced: &[&str], filters: &[&str]) -> QueryUsage {
        let set = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect();
        QueryUsage {
            query_id: id.to_string(),
            kind: QueryKind::Interactive,
            referenced: set(referenced),
            join_columns: Default::default(),
            filter_columns: set(filters),
        }
    }

    #[test]
    fn test_usage_and_predicate_bonus() {
        let queries = vec![
            usage("q1", &["a", "b"], &["a"]),
            usage("q2", &["a"], &[]),
        ];
        let summary = UsageAggregator::new("events").aggregate(&queries).unwrap();
        let impact = ResourceImpactAnalyzer::default().analyze(Vec::new()).unwrap();
        let scores = ScoringEngine::default().score_table(&table(), &summary, &impact);

        let order: Vec<&str> = scores.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);

        let a = &scores[0];
        assert!((a.composite - (1.0 + 0.2 * 0.5)).abs() < 1e-12);
        let b = &scores[1];
        assert!((b.composite - 0.5).abs() < 1e-12);
        let c = &scores[2];
        assert_eq!(c.composite, 0.0);
        assert!(!c.is_eligible(ScoringWeights::default().min_score));
        assert!(b.is_eligible(ScoringWeights::default().min_score));
    }

    #[test]
    fn test_empty_corpus_uses_neutral_usage_and_resource() {
        let summary = UsageAggregator::new("events").aggregate(&[]).unwrap();
        let impact = ResourceImpactAnalyzer::default().analyze(Vec::new()).unwrap();
        let scores = ScoringEngine::default().score_table(&table(), &summary, &impact);
        for score in &scores {
            assert!(score.usage.is_neutral());
            assert!(score.resource.is_neutral());
            assert_eq!(score.composite, 1.0);
        }
        // Equal scores fall back to column name order.
        let order: Vec<&str> = scores.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_break_on_predicate_mentions() {
        let a = ColumnScore {
            table: "t".into(),
            column: "a".into(),
            composite: 0.5,
            usage: FactorValue::measured(1.0),
            cardinality: FactorValue::measured(1.0),
            resource: FactorValue::measured(1.0),
            skew: FactorValue::measured(1.0),
            predicate_ratio: 0.0,
            global_mentions: 4,
            predicate_mentions: 1,
        };
        let z = ColumnScore {
            column: "z".into(),
            predicate_mentions: 3,
            ..a.clone()
        };
        let mut scores = vec![a, z];
        scores.sort_by(ColumnScore::rank_cmp);
        assert_eq!(scores[0].column, "z");
    }

    #[test]
    fn test_resource_multiplier_is_applied() {
        let queries = vec![usage("q1", &["a"], &[]), usage("q2", &["b"], &[])];
        let summary = UsageAggregator::new("events").aggregate(&queries).unwrap();
        let sample = |id: &str, exec: f64, column: &str| ResourceSample {
            query_id: id.to_string(),
            resources: QueryResources {
                execution_ms: exec,
                ..QueryResources::default()
            },
            class_weight: 1.0,
            columns: std::iter::once(column.to_string()).collect(),
        };
        let impact = ResourceImpactAnalyzer::default()
            .analyze(vec![sample("q1", 100.0, "a"), sample("q2", 50.0, "b")])
            .unwrap();
        let scores = ScoringEngine::default().score_table(&table(), &summary, &impact);

        assert_eq!(scores[0].column, "a");
        assert_eq!(scores[0].resource.value, 1.5);
        assert_eq!(scores[1].resource.value, 1.0);
        assert!(scores[0].evidence().contains("resource 1.500"));
    }

    #[test]
    fn test_dominant_value_lowers_composite() {
        let near_uniform = ValueHistogram::from_counts(
            (0..10u64).map(|i| (format!("v{i}"), 1_000 + i * 10)),
        );
        let dominated = ValueHistogram::from_counts(
            std::iter::once(("v0".to_string(), 90_000u64))
                .chain((1..10).map(|i| (format!("v{i}"), 1_111))),
        );
        let events = TableDescriptor::new("events")
            .with_row_count(1_000_000)
            .with_column(
                ColumnDescriptor::new("events", "flat", "bigint")
                    .with_distinct_count(1_000)
                    .with_histogram(near_uniform),
            )
            .with_column(
                ColumnDescriptor::new("events", "hot", "bigint")
                    .with_distinct_count(1_000)
                    .with_histogram(dominated),
            );

        let queries = vec![
            usage("q1", &["flat", "hot"], &["flat", "hot"]),
            usage("q2", &["flat", "hot"], &[]),
        ];
        let summary = UsageAggregator::new("events").aggregate(&queries).unwrap();
        let impact = ResourceImpactAnalyzer::default().analyze(Vec::new()).unwrap();
        let scores = ScoringEngine::default().score_table(&events, &summary, &impact);

        let score = |column: &str| scores.iter().find(|s| s.column == column).unwrap();
        let (flat, hot) = (score("flat"), score("hot"));
        assert_eq!(flat.usage, hot.usage);
        assert_eq!(flat.cardinality, hot.cardinality);
        assert_eq!(flat.predicate_ratio, hot.predicate_ratio);
        assert!(hot.skew.value < flat.skew.value);
        assert!(hot.composite < flat.composite);
        assert_eq!(scores[0].column, "flat");
    }
}
