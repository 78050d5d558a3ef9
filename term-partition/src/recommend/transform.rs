//! Partition transform selection.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::core::catalog::{ColumnDescriptor, ColumnType};

/// Partition transform applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "transform", content = "buckets", rename_all = "snake_case")]
pub enum PartitionTransform {
    Days,
    Months,
    Years,
    Bucket(u32),
    Identity,
}

impl PartitionTransform {
    /// Renders the transform applied to `column`, e.g. `months(order_date)`.
    pub fn render(&self, column: &str) -> String {
        match self {
            Self::Days => format!("days({column})"),
            Self::Months => format!("months({column})"),
            Self::Years => format!("years({column})"),
            Self::Bucket(n) => format!("bucket({column}, {n})"),
            Self::Identity => format!("identity({column})"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Months => "months",
            Self::Years => "years",
            Self::Bucket(_) => "bucket",
            Self::Identity => "identity",
        }
    }
}

impl fmt::Display for PartitionTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket(n) => write!(f, "bucket[{n}]"),
            other => f.write_str(other.name()),
        }
    }
}

/// Configuration of the transform policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Non-temporal columns with more distinct values than this are bucketed.
    pub high_cardinality_threshold: u64,
    /// Target number of distinct values per bucket.
    pub distinct_per_bucket: u64,
    pub min_bucket_count: u32,
    pub max_bucket_count: u32,
    /// Temporal spans up to this many days use `days`.
    pub days_max_span_days: i64,
    /// Temporal spans up to this many days use `months`; longer use `years`.
    pub months_max_span_days: i64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            high_cardinality_threshold: 10_000,
            distinct_per_bucket: 1_000,
            min_bucket_count: 4,
            max_bucket_count: 128,
            days_max_span_days: 92,
            months_max_span_days: 1_096,
        }
    }
}

/// Chooses a transform per column from its type and statistics.
#[derive(Debug, Clone, Default)]
pub struct TransformSelector {
    config: TransformConfig,
}

impl TransformSelector {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn select(&self, column: &ColumnDescriptor) -> PartitionTransform {
        match column.column_type {
            ColumnType::Temporal => self.temporal_transform(column),
            _ => match column.distinct_count {
                Some(distinct) if distinct > self.config.high_cardinality_threshold => {
                    PartitionTransform::Bucket(self.bucket_count(distinct))
                }
                _ => PartitionTransform::Identity,
            },
        }
    }

    /// `next_power_of_two(ceil(distinct / distinct_per_bucket))`, clamped.
    pub fn bucket_count(&self, distinct: u64) -> u32 {
        let per_bucket = self.config.distinct_per_bucket.max(1);
        let wanted = (distinct / per_bucket + u64::from(distinct % per_bucket != 0)).max(1);
        let rounded = wanted.checked_next_power_of_two().unwrap_or(u64::MAX);
        let clamped = rounded.clamp(
            u64::from(self.config.min_bucket_count),
            u64::from(self.config.max_bucket_count),
        );
        u32::try_from(clamped).unwrap_or(self.config.max_bucket_count)
    }

    fn temporal_transform(&self, column: &ColumnDescriptor) -> PartitionTransform {
        let span_days = observed_span_days(column).or_else(|| {
            // One distinct date per day is the usual shape of date columns.
            column
                .distinct_count
                .map(|d| i64::try_from(d).unwrap_or(i64::MAX))
        });
        match span_days {
            Some(days) if days <= self.config.days_max_span_days => PartitionTransform::Days,
            Some(days) if days <= self.config.months_max_span_days => PartitionTransform::Months,
            Some(_) => PartitionTransform::Years,
            None => PartitionTransform::Months,
        }
    }
}

/// Span in days between the earliest and latest parseable sampled values.
/// Needs at least two distinct parsed instants.
fn observed_span_days(column: &ColumnDescriptor) -> Option<i64> {
    let histogram_values = column
        .histogram
        .iter()
        .flat_map(|h| h.buckets().iter().map(|b| b.value.as_str()));
    let candidates = column
        .min_value
        .iter()
        .chain(column.max_value.iter())
        .map(String::as_str)
        .chain(column.sample_values.iter().map(String::as_str))
        .chain(histogram_values);

    let mut earliest: Option<NaiveDateTime> = None;
    let mut latest: Option<NaiveDateTime> = None;
    for value in candidates {
        if let Some(instant) = parse_instant(value) {
            earliest = Some(earliest.map_or(instant, |e| e.min(instant)));
            latest = Some(latest.map_or(instant, |l| l.max(instant)));
        }
    }
    match (earliest, latest) {
        (Some(earliest), Some(latest)) if latest > earliest => {
            Some((latest - earliest).num_days())
        }
        _ => None,
    }
}

fn parse_instant(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::ValueHistogram;

    fn date_column() -> ColumnDescriptor {
        ColumnDescriptor::new("orders", "order_date", "date")
    }

    #[test]
    fn test_render() {
        assert_eq!(PartitionTransform::Months.render("order_date"), "months(order_date)");
        assert_eq!(
            PartitionTransform::Bucket(128).render("customer_id"),
            "bucket(customer_id, 128)"
        );
        assert_eq!(PartitionTransform::Identity.render("status"), "identity(status)");
    }

    #[test]
    fn test_temporal_span_thresholds() {
        let selector = TransformSelector::default();
        let days = date_column().with_range("2024-01-01", "2024-03-15");
        assert_eq!(selector.select(&days), PartitionTransform::Days);

        let months = date_column().with_range("2022-01-01", "2024-06-30");
        assert_eq!(selector.select(&months), PartitionTransform::Months);

        let years = date_column().with_range("2010-01-01", "2024-06-30");
        assert_eq!(selector.select(&years), PartitionTransform::Years);
    }

    #[test]
    fn test_temporal_span_from_timestamps_and_samples() {
        let selector = TransformSelector::default();
        let column = ColumnDescriptor::new("events", "ts", "timestamp").with_samples(vec![
            "2024-01-01 08:00:00",
            "not a date",
            "2024-01-20T10:15:00Z",
        ]);
        assert_eq!(selector.select(&column), PartitionTransform::Days);

        let histogram = ValueHistogram::from_counts(vec![("2019-05-01", 3), ("2024-05-01", 4)]);
        let column = date_column().with_histogram(histogram);
        assert_eq!(selector.select(&column), PartitionTransform::Years);
    }

    #[test]
    fn test_temporal_fallbacks() {
        let selector = TransformSelector::default();
        assert_eq!(
            selector.select(&date_column().with_distinct_count(30)),
            PartitionTransform::Days
        );
        assert_eq!(
            selector.select(&date_column().with_distinct_count(730)),
            PartitionTransform::Months
        );
        assert_eq!(
            selector.select(&date_column().with_distinct_count(5_000)),
            PartitionTransform::Years
        );
        assert_eq!(selector.select(&date_column()), PartitionTransform::Months);
        // A single parseable value gives no span.
        assert_eq!(
            selector.select(&date_column().with_samples(vec!["2024-01-01"])),
            PartitionTransform::Months
        );
    }

    #[test]
    fn test_bucket_counts() {
        let selector = TransformSelector::default();
        assert_eq!(selector.bucket_count(10_001), 16);
        assert_eq!(selector.bucket_count(50_000), 64);
        assert_eq!(selector.bucket_count(150_000), 128);
        assert_eq!(selector.bucket_count(u64::MAX), 128);
        assert_eq!(selector.bucket_count(1), 4);
    }

    #[test]
    fn test_non_temporal_policy() {
        let selector = TransformSelector::default();
        let customer = ColumnDescriptor::new("orders", "customer_id", "bigint")
            .with_distinct_count(150_000);
        assert_eq!(selector.select(&customer), PartitionTransform::Bucket(128));

        let status = ColumnDescriptor::new("orders", "status", "varchar").with_distinct_count(5);
        assert_eq!(selector.select(&status), PartitionTransform::Identity);

        let at_threshold =
            ColumnDescriptor::new("orders", "sku", "varchar").with_distinct_count(10_000);
        assert_eq!(selector.select(&at_threshold), PartitionTransform::Identity);

        let unknown = ColumnDescriptor::new("orders", "note", "varchar");
        assert_eq!(selector.select(&unknown), PartitionTransform::Identity);
    }
}
