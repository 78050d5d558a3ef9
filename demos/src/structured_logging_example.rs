//! Structured logging with the partition advisor.
//!
//! Installs a JSON `tracing` subscriber, turns on per-query and per-factor
//! logging, and prints the report as JSON. Set `RUST_LOG` to override the
//! filter, e.g. `RUST_LOG=term_partition=trace`.
//!
//! Run with:
//! ```bash
//! cargo run --example structured_logging_example
//! ```

use std::time::Duration;

use term_partition::formatters::JsonFormatter;
use term_partition::logging::setup::{init_logging, LoggingConfig};
use term_partition::prelude::*;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::production()
            .with_json_format(true)
            .with_advisor_level(Level::TRACE),
    )?;

    let events = TableDescriptor::new("events")
        .with_row_count(2_000_000)
        .with_column(
            ColumnDescriptor::new("events", "event_day", "date")
                .with_distinct_count(60)
                .with_range("2024-05-01", "2024-06-29"),
        )
        .with_column(ColumnDescriptor::new("events", "user_id", "bigint").with_distinct_count(80_000))
        .with_column(ColumnDescriptor::new("events", "kind", "varchar").with_distinct_count(12));

    let queries = vec![
        QueryRecord::new("e1", "SELECT kind, COUNT(*) FROM events WHERE event_day = '2024-06-01' GROUP BY kind")
            .with_execution_time(Duration::from_millis(800)),
        QueryRecord::new("e2", "SELECT * FROM events WHERE user_id = 99 AND event_day > '2024-06-20'")
            .with_execution_time(Duration::from_millis(300)),
        QueryRecord::new("e3", "SELECT * FROM events WHERE")
            .with_target_table("events")
            .with_execution_time(Duration::from_millis(10)),
    ];

    let advisor = PartitionAdvisor::new(AdvisorConfig::default())?.with_log_config(LogConfig::verbose());
    let report = advisor.run(&[events], &queries)?;
    info!(
        tables = report.tables.len(),
        parse_failures = report.stats.parse_failures,
        "Advisor finished"
    );

    let formatter = JsonFormatter::with_config(FormatterConfig::minimal()).with_pretty(true);
    println!("{}", formatter.format(&report)?);
    Ok(())
}
