//! Basic example of the partition advisor.
//!
//! This example shows how to:
//! - Describe a table and its column statistics
//! - Feed a small query log with execution metrics
//! - Print the recommendation and its DDL
//!
//! Run with:
//! ```bash
//! cargo run --example basic_recommendation
//! ```

use std::time::Duration;

use term_partition::formatters::HumanFormatter;
use term_partition::prelude::*;
use term_partition::sources::InMemorySource;

fn orders() -> TableDescriptor {
    TableDescriptor::new("orders")
        .with_row_count(10_000_000)
        .with_column(ColumnDescriptor::new("orders", "id", "bigint").with_distinct_count(10_000_000))
        .with_column(
            ColumnDescriptor::new("orders", "order_date", "date")
                .with_distinct_count(1_096)
                .with_range("2022-01-01", "2024-12-31"),
        )
        .with_column(ColumnDescriptor::new("orders", "customer_id", "bigint").with_distinct_count(150_000))
        .with_column(
            ColumnDescriptor::new("orders", "status", "varchar")
                .with_distinct_count(4)
                .with_histogram(ValueHistogram::from_counts(vec![
                    ("delivered", 8_500_000u64),
                    ("shipped", 1_000_000),
                    ("open", 400_000),
                    ("cancelled", 100_000),
                ])),
        )
}

fn query(id: &str, sql: &str, seconds: u64) -> QueryRecord {
    QueryRecord::new(id, sql)
        .with_execution_time(Duration::from_secs(seconds))
        .with_cpu_time(Duration::from_secs(seconds * 4))
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let source = InMemorySource::new().with_table(orders()).with_queries(vec![
        query(
            "q1",
            "SELECT SUM(total) FROM orders WHERE order_date >= '2024-01-01' AND status = 'delivered'",
            3,
        ),
        query(
            "q2",
            "SELECT o.id, c.name FROM orders o JOIN customers c ON o.customer_id = c.id \
             WHERE o.order_date BETWEEN '2024-01-01' AND '2024-03-31'",
            45,
        ),
        query("q3", "SELECT * FROM orders WHERE customer_id = 42", 1),
        query("q4", "SELECT status, COUNT(*) FROM orders GROUP BY status", 20),
    ]);

    println!("Loading from {} and {}\n", QueryLogSource::description(&source), CatalogSource::description(&source));
    let tables = source.load_tables().await?;
    let queries = source.load_queries().await?;

    let config = AdvisorConfig::builder().top_n(2).build()?;
    let advisor = PartitionAdvisor::new(config)?;
    let report = advisor.run(&tables, &queries)?;

    println!("{}", HumanFormatter::new().format(&report)?);
    println!("{}", report.to_ddl());
    Ok(())
}
