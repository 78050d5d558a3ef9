//! Per-table partition specifications.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::transform::{PartitionTransform, TransformSelector};
use crate::analyzers::scoring::ColumnScore;
use crate::core::catalog::TableDescriptor;
use crate::error::Result;

/// One column chosen for the partition specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedColumn {
    /// 1-based position in the specification.
    pub rank: usize,
    pub column: String,
    pub transform: PartitionTransform,
    /// Rendered partition field, e.g. `months(order_date)`.
    pub field: String,
    pub score: ColumnScore,
    pub evidence: String,
}

/// Terminal output for one table: its partition columns, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionRecommendation {
    pub table: String,
    pub columns: Vec<RecommendedColumn>,
    /// Number of scored columns the selection was made from.
    pub candidates_considered: usize,
}

impl PartitionRecommendation {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn partition_fields(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.field.as_str()).collect()
    }

    /// Renders partition DDL for the execution collaborator, preceded by the
    /// factor breakdown as SQL comments. Nothing is executed here.
    pub fn to_ddl(&self) -> String {
        if self.columns.is_empty() {
            return format!(
                "-- No suitable partition column found for {} ({} candidates considered)\n",
                self.table, self.candidates_considered
            );
        }

        let mut ddl = format!(
            "-- Partition recommendation for {} ({} candidates considered)\n",
            self.table, self.candidates_considered
        );
        for column in &self.columns {
            ddl.push_str(&format!(
                "-- {}. {}: {}\n",
                column.rank, column.field, column.evidence
            ));
        }
        let fields = self
            .columns
            .iter()
            .map(|c| format!("'{}'", c.field))
            .collect::<Vec<_>>()
            .join(", ");
        ddl.push_str(&format!(
            "ALTER TABLE {} SET PROPERTIES partitioning = ARRAY[{fields}];\n",
            self.table
        ));
        ddl
    }

    /// Structured JSON for a visualization collaborator.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Selects the top-N scored columns of a table and assigns their transforms.
#[derive(Debug, Clone)]
pub struct PartitionSpecGenerator {
    top_n: usize,
    min_score: f64,
    selector: TransformSelector,
}

impl PartitionSpecGenerator {
    pub fn new(top_n: usize, min_score: f64, selector: TransformSelector) -> Self {
        Self {
            top_n,
            min_score,
            selector,
        }
    }

    /// `scores` must already be in ranking order.
    #[instrument(skip_all, fields(table = %table.name, top_n = self.top_n))]
    pub fn generate(&self, table: &TableDescriptor, scores: &[ColumnScore]) -> PartitionRecommendation {
        let columns: Vec<RecommendedColumn> = scores
            .iter()
            .filter(|score| score.is_eligible(self.min_score))
            .filter_map(|score| table.column(&score.column).map(|c| (score, c)))
            .take(self.top_n)
            .enumerate()
            .map(|(i, (score, descriptor))| {
                let transform = self.selector.select(descriptor);
                RecommendedColumn {
                    rank: i + 1,
                    column: score.column.clone(),
                    transform,
                    field: transform.render(&score.column),
                    evidence: score.evidence(),
                    score: score.clone(),
                }
            })
            .collect();

        debug!(
            chosen = columns.len(),
            candidates = scores.len(),
            "Generated partition specification"
        );
        PartitionRecommendation {
            table: table.name.clone(),
            columns,
            candidates_considered: scores.len(),
        }
    }
}

impl Default for PartitionSpecGenerator {
    fn default() -> Self {
        Self::new(3, 0.0, TransformSelector::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::FactorValue;
    use crate::core::catalog::ColumnDescriptor;

    fn score(column: &str, composite: f64) -> ColumnScore {
        ColumnScore {
            table: "orders".into(),
            column: column.into(),
            composite,
            usage: FactorValue::measured(1.0),
            cardinality: FactorValue::measured(1.0),
            resource: FactorValue::neutral(1.0),
            skew: FactorValue::neutral(1.0),
            predicate_ratio: 1.0,
            global_mentions: 2,
            predicate_mentions: 2,
        }
    }

    fn table() -> TableDescriptor {
        TableDescriptor::new("orders")
            .with_column(
                ColumnDescriptor::new("orders", "order_date", "date")
                    .with_range("2022-01-01", "2024-12-31"),
            )
            .with_column(
                ColumnDescriptor::new("orders", "customer_id", "bigint")
                    .with_distinct_count(150_000),
            )
            .with_column(ColumnDescriptor::new("orders", "status", "varchar").with_distinct_count(4))
    }

    #[test]
    fn test_top_n_and_transforms() {
        let generator = PartitionSpecGenerator::new(2, 0.0, TransformSelector::default());
        let scores = vec![
            score("order_date", 1.7),
            score("customer_id", 0.3),
            score("status", 0.2),
        ];
        let recommendation = generator.generate(&table(), &scores);

        assert_eq!(
            recommendation.partition_fields(),
            vec!["months(order_date)", "bucket(customer_id, 128)"]
        );
        assert_eq!(recommendation.columns[0].rank, 1);
        assert_eq!(recommendation.candidates_considered, 3);
    }

    #[test]
    fn test_min_score_and_unknown_columns_are_skipped() {
        let generator = PartitionSpecGenerator::default();
        let scores = vec![
            score("ghost", 5.0),
            score("status", 0.4),
            score("order_date", 0.0),
        ];
        let recommendation = generator.generate(&table(), &scores);
        assert_eq!(recommendation.partition_fields(), vec!["identity(status)"]);
    }

    #[test]
    fn test_score_equal_to_threshold_is_not_recommended() {
        let generator = PartitionSpecGenerator::new(3, 0.3, TransformSelector::default());
        let scores = vec![
            score("order_date", 0.31),
            score("customer_id", 0.3),
            score("status", 0.1),
        ];
        let recommendation = generator.generate(&table(), &scores);
        assert_eq!(recommendation.partition_fields(), vec!["months(order_date)"]);
        assert_eq!(recommendation.candidates_considered, 3);
    }

    #[test]
    fn test_ddl_rendering() {
        let generator = PartitionSpecGenerator::new(2, 0.0, TransformSelector::default());
        let recommendation =
            generator.generate(&table(), &[score("order_date", 1.7), score("customer_id", 0.3)]);
        let ddl = recommendation.to_ddl();
        assert!(ddl.ends_with(
            "ALTER TABLE orders SET PROPERTIES partitioning = ARRAY['months(order_date)', 'bucket(customer_id, 128)'];\n"
        ));
        assert!(ddl.contains("-- 1. months(order_date): score 1.700"));

        let empty = generator.generate(&table(), &[]);
        assert!(empty.is_empty());
        assert!(empty.to_ddl().starts_with("-- No suitable partition column found for orders"));
    }

    #[test]
    fn test_json_rendering() {
        let recommendation = PartitionSpecGenerator::default()
            .generate(&table(), &[score("customer_id", 0.3)]);
        let json: serde_json::Value =
            serde_json::from_str(&recommendation.to_json().unwrap()).unwrap();
        assert_eq!(json["table"], "orders");
        assert_eq!(json["columns"][0]["field"], "bucket(customer_id, 128)");
        assert_eq!(json["columns"][0]["transform"]["transform"], "bucket");
        assert_eq!(json["columns"][0]["transform"]["buckets"], 128);
    }
}
