//! Catalog metadata: tables, their columns and the sampled statistics the
//! analyzers consume.

use std::collections::HashMap;

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

use super::names::{normalize_identifier, normalize_qualified};

/// Categorical column type used by the transform policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Temporal,
    Numeric,
    String,
    Other,
}

impl ColumnType {
    /// Maps an engine type name (`DATE`, `timestamp(3) with time zone`,
    /// `varchar(32)`, `decimal(10,2)`, ...) to its category.
    pub fn from_type_name(type_name: &str) -> Self {
        let lower = type_name.trim().to_lowercase();
        let base = lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();
        match base {
            "date" | "date32" | "date64" | "timestamp" | "timestamptz" | "datetime" | "time" => {
                Self::Temporal
            }
            "tinyint" | "smallint" | "int" | "integer" | "bigint" | "int8" | "int16" | "int32"
            | "int64" | "uint8" | "uint16" | "uint32" | "uint64" | "real" | "float" | "double"
            | "float32" | "float64" | "decimal" | "numeric" => Self::Numeric,
            "char" | "varchar" | "string" | "text" | "utf8" | "largeutf8" | "utf8view" => {
                Self::String
            }
            _ => Self::Other,
        }
    }

    /// Maps an Arrow data type to its category.
    pub fn from_arrow(data_type: &DataType) -> Self {
        match data_type {
            DataType::Date32
            | DataType::Date64
            | DataType::Timestamp(_, _)
            | DataType::Time32(_)
            | DataType::Time64(_) => Self::Temporal,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => Self::Numeric,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Self::String,
            DataType::Dictionary(_, value) => Self::from_arrow(value),
            _ => Self::Other,
        }
    }
}

/// One value of a histogram together with its frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub count: u64,
}

/// Value-frequency histogram, kept sorted by count descending then value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueHistogram {
    buckets: Vec<ValueFrequency>,
}

impl ValueHistogram {
    /// Builds a histogram from `(value, count)` pairs. Repeated values are
    /// summed and zero counts dropped.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut merged: HashMap<String, u64> = HashMap::new();
        for (value, count) in counts {
            if count > 0 {
                *merged.entry(value.into()).or_default() += count;
            }
        }
        let mut buckets: Vec<ValueFrequency> = merged
            .into_iter()
            .map(|(value, count)| ValueFrequency { value, count })
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        Self { buckets }
    }

    pub fn buckets(&self) -> &[ValueFrequency] {
        &self.buckets
    }

    /// Number of distinct values in the histogram.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of all frequencies.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    /// Share of the total held by the `k` most frequent values.
    pub fn top_k_share(&self, k: usize) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let top: u64 = self.buckets.iter().take(k).map(|b| b.count).sum();
        top as f64 / total as f64
    }
}

/// A column of a catalog table with whatever statistics were sampled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub table: String,
    pub name: String,
    pub column_type: ColumnType,
    /// Engine type name as reported by the catalog, for display.
    pub type_name: String,
    pub distinct_count: Option<u64>,
    pub histogram: Option<ValueHistogram>,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
    pub sample_values: Vec<String>,
}

impl ColumnDescriptor {
    /// Creates a descriptor from an engine type name; the category is derived.
    pub fn new(table: impl AsRef<str>, name: impl AsRef<str>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            table: normalize_qualified(table.as_ref()),
            name: normalize_identifier(name.as_ref()),
            column_type: ColumnType::from_type_name(&type_name),
            type_name,
            distinct_count: None,
            histogram: None,
            min_value: None,
            max_value: None,
            sample_values: Vec::new(),
        }
    }

    pub fn with_column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn with_distinct_count(mut self, distinct: u64) -> Self {
        self.distinct_count = Some(distinct);
        self
    }

    pub fn with_histogram(mut self, histogram: ValueHistogram) -> Self {
        self.histogram = Some(histogram);
        self
    }

    pub fn with_range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    pub fn with_samples<I, S>(mut self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sample_values = samples.into_iter().map(Into::into).collect();
        self
    }
}

/// A catalog table: its name, approximate size and columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub row_count: Option<u64>,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize_qualified(name.as_ref()),
            row_count: None,
            columns: Vec::new(),
        }
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    /// Adds a column, re-homing it onto this table.
    pub fn with_column(mut self, mut column: ColumnDescriptor) -> Self {
        column.table = self.name.clone();
        self.columns.push(column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        let name = normalize_identifier(name);
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::TimeUnit;

    #[test]
    fn test_column_type_from_type_name() {
        assert_eq!(ColumnType::from_type_name("DATE"), ColumnType::Temporal);
        assert_eq!(
            ColumnType::from_type_name("timestamp(3) with time zone"),
            ColumnType::Temporal
        );
        assert_eq!(ColumnType::from_type_name("bigint"), ColumnType::Numeric);
        assert_eq!(ColumnType::from_type_name("decimal(10,2)"), ColumnType::Numeric);
        assert_eq!(ColumnType::from_type_name("varchar(32)"), ColumnType::String);
        assert_eq!(ColumnType::from_type_name("boolean"), ColumnType::Other);
    }

    #[test]
    fn test_column_type_from_arrow() {
        assert_eq!(
            ColumnType::from_arrow(&DataType::Timestamp(TimeUnit::Microsecond, None)),
            ColumnType::Temporal
        );
        assert_eq!(ColumnType::from_arrow(&DataType::Int64), ColumnType::Numeric);
        assert_eq!(ColumnType::from_arrow(&DataType::Utf8), ColumnType::String);
        assert_eq!(
            ColumnType::from_arrow(&DataType::Dictionary(
                Box::new(DataType::Int32),
                Box::new(DataType::Utf8)
            )),
            ColumnType::String
        );
        assert_eq!(ColumnType::from_arrow(&DataType::Boolean), ColumnType::Other);
    }

    #[test]
    fn test_histogram_sorting_and_merging() {
        let histogram =
            ValueHistogram::from_counts(vec![("b", 5), ("a", 5), ("c", 10), ("b", 1), ("z", 0)]);
        let values: Vec<&str> = histogram.buckets().iter().map(|b| b.value.as_str()).collect();
        assert_eq!(values, vec!["c", "b", "a"]);
        assert_eq!(histogram.total(), 21);
        assert_eq!(histogram.len(), 3);
    }

    #[test]
    fn test_top_k_share() {
        let histogram = ValueHistogram::from_counts(vec![("a", 6), ("b", 3), ("c", 1)]);
        assert!((histogram.top_k_share(1) - 0.6).abs() < 1e-12);
        assert!((histogram.top_k_share(5) - 1.0).abs() < 1e-12);
        assert_eq!(ValueHistogram::default().top_k_share(3), 0.0);
    }

    #[test]
    fn test_table_descriptor_lookup() {
        let table = TableDescriptor::new("Sales.Orders")
            .with_row_count(100)
            .with_column(ColumnDescriptor::new("ignored", "Order_Date", "date"));
        assert_eq!(table.name, "sales.orders");
        let column = table.column("ORDER_DATE").unwrap();
        assert_eq!(column.table, "sales.orders");
        assert_eq!(column.column_type, ColumnType::Temporal);
        assert!(!table.has_column("status"));
    }
}
