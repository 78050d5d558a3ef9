//! Profiling a DataFusion table and reading its query log from DataFusion.
//!
//! Both the table and the query log are registered in a `SessionContext`.
//! The catalog source profiles the table with SQL (row count, distinct counts,
//! small-domain histograms, temporal ranges) and the query-log source reads
//! the log table. The report is rendered as Markdown.
//!
//! Run with:
//! ```bash
//! cargo run --example datafusion_query_log
//! ```

use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use term_partition::formatters::MarkdownFormatter;
use term_partition::prelude::*;
use term_partition::sources::{DataFusionCatalog, DataFusionQueryLog};

const DAYS_2024_01_01: i32 = 19_723;

fn orders() -> Result<RecordBatch> {
    let rows = 5_000;
    let dates: Vec<i32> = (0..rows).map(|i| DAYS_2024_01_01 + (i % 180)).collect();
    let customers: Vec<i64> = (0..rows).map(|i| i64::from(i % 700)).collect();
    let statuses: Vec<&str> = (0..rows)
        .map(|i| match i % 20 {
            0 => "open",
            1 => "cancelled",
            2 | 3 => "shipped",
            _ => "delivered",
        })
        .collect();
    let totals: Vec<f64> = (0..rows).map(|i| f64::from(i % 997) * 1.25).collect();

    Ok(RecordBatch::try_from_iter(vec![
        ("order_date", Arc::new(Date32Array::from(dates)) as ArrayRef),
        ("customer_id", Arc::new(Int64Array::from(customers)) as ArrayRef),
        ("status", Arc::new(StringArray::from(statuses)) as ArrayRef),
        ("total", Arc::new(Float64Array::from(totals)) as ArrayRef),
    ])?)
}

fn query_log() -> Result<RecordBatch> {
    let queries: [(&str, &str, i64, f64); 5] = [
        ("q1", "SELECT SUM(total) FROM orders WHERE order_date >= '2024-03-01'", 2_500, 9_000.0),
        ("q2", "SELECT * FROM orders WHERE customer_id = 17", 300, 450.0),
        ("q3", "SELECT status, COUNT(*) FROM orders WHERE order_date < '2024-02-01' GROUP BY status", 14_000, 52_000.0),
        ("q4", "SELECT customer_id, SUM(total) FROM orders WHERE order_date BETWEEN '2024-01-01' AND '2024-01-31' GROUP BY customer_id", 6_000, 21_000.0),
        ("q5", "SELECT * FROM orders WHERE status = 'open' LIMIT 50", 120, 200.0),
    ];

    Ok(RecordBatch::try_from_iter(vec![
        (
            "query_id",
            Arc::new(StringArray::from_iter_values(queries.iter().map(|q| q.0))) as ArrayRef,
        ),
        (
            "query",
            Arc::new(StringArray::from_iter_values(queries.iter().map(|q| q.1))) as ArrayRef,
        ),
        (
            "execution_time_ms",
            Arc::new(Int64Array::from_iter_values(queries.iter().map(|q| q.2))) as ArrayRef,
        ),
        (
            "cpu_time_ms",
            Arc::new(Float64Array::from_iter_values(queries.iter().map(|q| q.3))) as ArrayRef,
        ),
        (
            "peak_memory_bytes",
            Arc::new(Int64Array::from_iter_values(queries.iter().map(|q| q.2 * 4_096))) as ArrayRef,
        ),
    ])?)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let ctx = SessionContext::new();
    ctx.register_batch("orders", orders()?)?;
    ctx.register_batch("query_log", query_log()?)?;

    let catalog = DataFusionCatalog::new(ctx.clone()).with_table("orders");
    let log = DataFusionQueryLog::new(ctx, "query_log").with_filter("execution_time_ms > 100")?;

    println!("Profiling {}", catalog.description());
    let tables = catalog.load_tables().await?;
    println!("Reading {}", log.description());
    let queries = log.load_queries().await?;

    let advisor = PartitionAdvisor::new(AdvisorConfig::interactive_first())?;
    let report = advisor.run_parallel(&tables, &queries).await?;

    let formatter = MarkdownFormatter::with_config(FormatterConfig::detailed());
    println!("{}", formatter.format(&report)?);
    Ok(())
}
