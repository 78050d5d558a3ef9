//! DataFusion-backed catalog and query-log readers.

use std::time::Duration;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use datafusion::prelude::SessionContext;
use tracing::{debug, instrument, warn};

use super::{CatalogSource, QueryLogSource};
use crate::core::{
    ColumnDescriptor, ColumnType, QueryRecord, TableDescriptor, TableFailure, ValueHistogram,
};
use crate::error::{ErrorContext, Result, TermError};
use crate::security::SqlSecurity;

/// Profiles tables registered with a `SessionContext` into [`TableDescriptor`]s.
///
/// For every column it reads the Arrow type, an approximate distinct count
/// and, for columns with few distinct values, the full value-frequency
/// histogram. Temporal columns also get their minimum and maximum.
#[derive(Clone)]
pub struct DataFusionCatalog {
    ctx: SessionContext,
    tables: Vec<String>,
    histogram_threshold: u64,
    exact_distinct: bool,
}

impl std::fmt::Debug for DataFusionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionCatalog")
            .field("tables", &self.tables)
            .field("histogram_threshold", &self.histogram_threshold)
            .field("exact_distinct", &self.exact_distinct)
            .finish()
    }
}

impl DataFusionCatalog {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            tables: Vec::new(),
            histogram_threshold: 100,
            exact_distinct: false,
        }
    }

    pub fn with_table(mut self, name: impl Into<String>) -> Self {
        self.tables.push(name.into());
        self
    }

    pub fn with_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(names.into_iter().map(Into::into));
        self
    }

    /// Columns with at most this many distinct values get a histogram.
    pub fn with_histogram_threshold(mut self, threshold: u64) -> Self {
        self.histogram_threshold = threshold;
        self
    }

    /// Uses `COUNT(DISTINCT ..)` instead of `approx_distinct`.
    pub fn with_exact_distinct(mut self, exact: bool) -> Self {
        self.exact_distinct = exact;
        self
    }

    /// Profiles one registered table.
    #[instrument(skip(self))]
    pub async fn profile_table(&self, name: &str) -> Result<TableDescriptor> {
        let quoted_table = SqlSecurity::quote_qualified_name(name)?;
        let df = self
            .ctx
            .table(name)
            .await
            .with_context(|| format!("Failed to resolve table '{name}'"))?;
        let fields: Vec<(String, DataType)> = df
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect();

        let row_count = self
            .scalar_u64(&format!("SELECT COUNT(*) AS row_count FROM {quoted_table}"))
            .await?;
        let mut table = TableDescriptor::new(name);
        if let Some(rows) = row_count {
            table = table.with_row_count(rows);
        }

        for (column, data_type) in fields {
            let descriptor = self
                .profile_column(&quoted_table, name, &column, &data_type)
                .await?;
            table = table.with_column(descriptor);
        }

        debug!(
            table = name,
            rows = ?row_count,
            columns = table.columns.len(),
            "Profiled table"
        );
        Ok(table)
    }

    /// Profiles every configured table. Tables that cannot be resolved or
    /// profiled are returned as failures next to the profiled ones.
    pub async fn profile_tables(&self) -> (Vec<TableDescriptor>, Vec<TableFailure>) {
        let mut tables = Vec::with_capacity(self.tables.len());
        let mut failures = Vec::new();
        for name in &self.tables {
            match self.profile_table(name).await {
                Ok(table) => tables.push(table),
                Err(e) => failures.push(TableFailure {
                    table: name.clone(),
                    error: e.to_string(),
                }),
            }
        }
        (tables, failures)
    }

    async fn profile_column(
        &self,
        quoted_table: &str,
        table: &str,
        column: &str,
        data_type: &DataType,
    ) -> Result<ColumnDescriptor> {
        let quoted = SqlSecurity::quote_identifier(column)?;
        let column_type = ColumnType::from_arrow(data_type);
        let mut descriptor = ColumnDescriptor::new(table, column, data_type.to_string())
            .with_column_type(column_type);

        let distinct = self.distinct_count(quoted_table, &quoted).await?;
        if let Some(distinct) = distinct {
            descriptor = descriptor.with_distinct_count(distinct);
        }

        if distinct.map_or(false, |d| d > 0 && d <= self.histogram_threshold) {
            let batches = self
                .collect(&format!(
                    "SELECT CAST({quoted} AS VARCHAR) AS value, COUNT(*) AS count \
                     FROM {quoted_table} WHERE {quoted} IS NOT NULL \
                     GROUP BY {quoted} ORDER BY count DESC"
                ))
                .await?;
            let mut counts = Vec::new();
            for batch in &batches {
                let values = string_column(batch.column(0))?;
                let frequencies = u64_column(batch.column(1))?;
                for (value, count) in values.into_iter().zip(frequencies) {
                    if let (Some(value), Some(count)) = (value, count) {
                        counts.push((value, count));
                    }
                }
            }
            descriptor = descriptor.with_histogram(ValueHistogram::from_counts(counts));
        }

        if column_type == ColumnType::Temporal {
            let batches = self
                .collect(&format!(
                    "SELECT CAST(MIN({quoted}) AS VARCHAR) AS min_value, \
                     CAST(MAX({quoted}) AS VARCHAR) AS max_value FROM {quoted_table}"
                ))
                .await?;
            if let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) {
                let min = string_column(batch.column(0))?.into_iter().next().flatten();
                let max = string_column(batch.column(1))?.into_iter().next().flatten();
                if let (Some(min), Some(max)) = (min, max) {
                    descriptor = descriptor.with_range(min, max);
                }
            }
        }

        Ok(descriptor)
    }

    async fn distinct_count(&self, quoted_table: &str, quoted: &str) -> Result<Option<u64>> {
        let exact = format!("SELECT COUNT(DISTINCT {quoted}) AS distinct_count FROM {quoted_table}");
        if self.exact_distinct {
            return self.scalar_u64(&exact).await;
        }

        let approx = format!("SELECT approx_distinct({quoted}) AS distinct_count FROM {quoted_table}");
        match self.scalar_u64(&approx).await {
            Ok(count) => Ok(count),
            Err(e) => {
                // approx_distinct does not accept every Arrow type.
                debug!(error = %e, "approx_distinct failed, falling back to COUNT(DISTINCT)");
                self.scalar_u64(&exact).await
            }
        }
    }

    async fn collect(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        Ok(df.collect().await?)
    }

    async fn scalar_u64(&self, sql: &str) -> Result<Option<u64>> {
        let batches = self.collect(sql).await?;
        match batches.iter().find(|b| b.num_rows() > 0) {
            Some(batch) => Ok(u64_column(batch.column(0))?.into_iter().next().flatten()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CatalogSource for DataFusionCatalog {
    /// Profiles every configured table, skipping the ones that fail.
    ///
    /// Fails only when no table at all could be profiled.
    async fn load_tables(&self) -> Result<Vec<TableDescriptor>> {
        let (tables, failures) = self.profile_tables().await;
        for failure in &failures {
            warn!(
                table = %failure.table,
                error = %failure.error,
                "Skipping table that could not be profiled"
            );
        }
        if tables.is_empty() && !failures.is_empty() {
            let reasons: Vec<String> = failures
                .iter()
                .map(|f| format!("{}: {}", f.table, f.error))
                .collect();
            return Err(TermError::data_source(
                "catalog",
                format!("no table could be profiled ({})", reasons.join("; ")),
            ));
        }
        Ok(tables)
    }

    fn description(&self) -> String {
        format!("DataFusion catalog ({})", self.tables.join(", "))
    }
}

/// Column names of a query-log table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLogColumns {
    pub query_id: String,
    pub query: String,
    pub execution_time_ms: String,
    pub cpu_time_ms: String,
    pub peak_memory_bytes: String,
    /// Read when present.
    pub input_bytes: String,
    /// Read when present; may hold a comma-separated list.
    pub target_table: String,
    /// Read when present.
    pub created_at: String,
}

impl Default for QueryLogColumns {
    fn default() -> Self {
        Self {
            query_id: "query_id".to_string(),
            query: "query".to_string(),
            execution_time_ms: "execution_time_ms".to_string(),
            cpu_time_ms: "cpu_time_ms".to_string(),
            peak_memory_bytes: "peak_memory_bytes".to_string(),
            input_bytes: "input_bytes".to_string(),
            target_table: "target_table".to_string(),
            created_at: "created_at".to_string(),
        }
    }
}

/// Reads [`QueryRecord`]s from a query-log table registered with a
/// `SessionContext`.
#[derive(Clone)]
pub struct DataFusionQueryLog {
    ctx: SessionContext,
    table: String,
    columns: QueryLogColumns,
    filter: Option<String>,
}

impl std::fmt::Debug for DataFusionQueryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionQueryLog")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("filter", &self.filter)
            .finish()
    }
}

impl DataFusionQueryLog {
    pub fn new(ctx: SessionContext, table: impl Into<String>) -> Self {
        Self {
            ctx,
            table: table.into(),
            columns: QueryLogColumns::default(),
            filter: None,
        }
    }

    pub fn with_columns(mut self, columns: QueryLogColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Restricts the log to rows matching `predicate`, typically a time
    /// window such as `created_at >= '2024-01-01'`.
    pub fn with_filter(mut self, predicate: impl Into<String>) -> Result<Self> {
        let predicate = predicate.into();
        SqlSecurity::validate_filter_expression(&predicate)?;
        self.filter = Some(predicate);
        Ok(self)
    }

    fn build_sql(&self, available: &[String]) -> Result<(String, Vec<Option<usize>>)> {
        let columns = &self.columns;
        let required = [
            &columns.query_id,
            &columns.query,
            &columns.execution_time_ms,
            &columns.cpu_time_ms,
            &columns.peak_memory_bytes,
        ];
        for name in required {
            if !available.contains(name) {
                return Err(TermError::ColumnNotFound {
                    table: self.table.clone(),
                    column: name.clone(),
                });
            }
        }

        let mut selected = required
            .iter()
            .map(|name| SqlSecurity::quote_identifier(name))
            .collect::<Result<Vec<_>>>()?;
        // Positions of the optional columns in the projection.
        let mut optional = Vec::new();
        for name in [&columns.input_bytes, &columns.target_table, &columns.created_at] {
            if available.contains(name) {
                optional.push(Some(selected.len()));
                selected.push(SqlSecurity::quote_identifier(name)?);
            } else {
                optional.push(None);
            }
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            selected.join(", "),
            SqlSecurity::quote_qualified_name(&self.table)?
        );
        if let Some(filter) = &self.filter {
            sql.push_str(&format!(" WHERE {filter}"));
        }
        sql.push_str(&format!(
            " ORDER BY {}",
            SqlSecurity::quote_identifier(&columns.query_id)?
        ));
        Ok((sql, optional))
    }

    fn records_from_batch(
        batch: &RecordBatch,
        optional: &[Option<usize>],
        out: &mut Vec<QueryRecord>,
    ) -> Result<()> {
        let ids = string_column(batch.column(0))?;
        let texts = string_column(batch.column(1))?;
        let execution = f64_column(batch.column(2))?;
        let cpu = f64_column(batch.column(3))?;
        let memory = u64_column(batch.column(4))?;
        let optional_column = |slot: usize| optional.get(slot).copied().flatten();
        let input_bytes = optional_column(0)
            .map(|i| u64_column(batch.column(i)))
            .transpose()?;
        let targets = optional_column(1)
            .map(|i| string_column(batch.column(i)))
            .transpose()?;
        let created = optional_column(2)
            .map(|i| string_column(batch.column(i)))
            .transpose()?;

        for row in 0..batch.num_rows() {
            let (Some(id), Some(sql)) = (ids[row].clone(), texts[row].clone()) else {
                warn!(row, "Skipping query-log row without id or text");
                continue;
            };
            let mut record = QueryRecord::new(id, sql)
                .with_execution_time(millis(execution[row]))
                .with_cpu_time(millis(cpu[row]))
                .with_peak_memory(memory[row].unwrap_or(0));
            if let Some(bytes) = input_bytes.as_ref().and_then(|v| v[row]) {
                record = record.with_input_bytes(bytes);
            }
            if let Some(tables) = targets.as_ref().and_then(|v| v[row].as_deref()) {
                for table in tables.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    record = record.with_target_table(table);
                }
            }
            if let Some(created_at) = created
                .as_ref()
                .and_then(|v| v[row].as_deref())
                .and_then(parse_timestamp)
            {
                record = record.with_created_at(created_at);
            }
            out.push(record);
        }
        Ok(())
    }
}

#[async_trait]
impl QueryLogSource for DataFusionQueryLog {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn load_queries(&self) -> Result<Vec<QueryRecord>> {
        let df = self
            .ctx
            .table(self.table.as_str())
            .await
            .map_err(|e| {
                TermError::data_source_with_source(
                    "query_log",
                    format!("Failed to resolve query log '{}'", self.table),
                    Box::new(e),
                )
            })?;
        let available: Vec<String> = df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();

        let (sql, optional) = self.build_sql(&available)?;
        let batches = self.ctx.sql(&sql).await?.collect().await?;

        let mut records = Vec::new();
        for batch in &batches {
            Self::records_from_batch(batch, &optional, &mut records)?;
        }
        debug!(queries = records.len(), "Loaded query log");
        Ok(records)
    }

    fn description(&self) -> String {
        format!("DataFusion query log ({})", self.table)
    }
}

fn millis(value: Option<f64>) -> Duration {
    value
        .and_then(|ms| Duration::try_from_secs_f64(ms.max(0.0) / 1000.0).ok())
        .unwrap_or(Duration::ZERO)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

fn downcast_error(expected: &str) -> TermError {
    TermError::Internal(format!("cast did not produce a {expected} array"))
}

fn string_column(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    let array = cast(array, &DataType::Utf8)?;
    let strings = array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| downcast_error("Utf8"))?;
    Ok((0..strings.len())
        .map(|i| (!strings.is_null(i)).then(|| strings.value(i).to_string()))
        .collect())
}

fn u64_column(array: &ArrayRef) -> Result<Vec<Option<u64>>> {
    let array = cast(array, &DataType::UInt64)?;
    let values = array
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| downcast_error("UInt64"))?;
    Ok((0..values.len())
        .map(|i| (!values.is_null(i)).then(|| values.value(i)))
        .collect())
}

fn f64_column(array: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let array = cast(array, &DataType::Float64)?;
    let values = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| downcast_error("Float64"))?;
    Ok((0..values.len())
        .map(|i| (!values.is_null(i)).then(|| values.value(i)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis() {
        assert_eq!(millis(Some(1_500.0)), Duration::from_millis(1_500));
        assert_eq!(millis(Some(-3.0)), Duration::ZERO);
        assert_eq!(millis(Some(f64::NAN)), Duration::ZERO);
        assert_eq!(millis(None), Duration::ZERO);
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2024-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01T10:00:00").is_some());
        assert!(parse_timestamp("2024-03-01 10:00:00.250").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_build_sql() {
        let log = DataFusionQueryLog::new(SessionContext::new(), "query_log")
            .with_filter("created_at >= '2024-01-01'")
            .unwrap();
        let available: Vec<String> = [
            "query_id",
            "query",
            "execution_time_ms",
            "cpu_time_ms",
            "peak_memory_bytes",
            "target_table",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let (sql, optional) = log.build_sql(&available).unwrap();
        assert_eq!(
            sql,
            "SELECT \"query_id\", \"query\", \"execution_time_ms\", \"cpu_time_ms\", \"peak_memory_bytes\", \"target_table\" \
             FROM \"query_log\" WHERE created_at >= '2024-01-01' ORDER BY \"query_id\""
        );
        assert_eq!(optional, vec![None, Some(5), None]);
    }

    #[test]
    fn test_missing_required_column() {
        let log = DataFusionQueryLog::new(SessionContext::new(), "query_log");
        let available = vec!["query_id".to_string(), "query".to_string()];
        match log.build_sql(&available) {
            Err(TermError::ColumnNotFound { table, column }) => {
                assert_eq!(table, "query_log");
                assert_eq!(column, "execution_time_ms");
            }
            other => panic!("expected ColumnNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unsafe_filter() {
        let log = DataFusionQueryLog::new(SessionContext::new(), "query_log");
        assert!(log.with_filter("1=1; DROP TABLE query_log").is_err());
    }
}
