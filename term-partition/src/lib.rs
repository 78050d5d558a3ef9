//! # Term Partition - Partition Column Recommendations
//!
//! Term Partition recommends partitioning columns for lakehouse tables by
//! analysing how a query engine actually uses them. It reads historical query
//! text and execution metrics, measures per-column usage, cardinality, value
//! skew and resource impact, and ranks the columns of each table by a
//! composite score. The top columns are emitted as a partition specification
//! with a transform per column (`days`, `months`, `years`, `bucket` or
//! `identity`).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use term_partition::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let orders = TableDescriptor::new("orders")
//!     .with_row_count(10_000_000)
//!     .with_column(
//!         ColumnDescriptor::new("orders", "order_date", "date")
//!             .with_distinct_count(1_096)
//!             .with_range("2022-01-01", "2024-12-31"),
//!     )
//!     .with_column(ColumnDescriptor::new("orders", "customer_id", "bigint").with_distinct_count(150_000));
//!
//! let queries = vec![
//!     QueryRecord::new("q1", "SELECT SUM(total) FROM orders WHERE order_date >= '2024-01-01'")
//!         .with_execution_time(Duration::from_secs(4)),
//!     QueryRecord::new("q2", "SELECT * FROM orders o JOIN customers c ON o.customer_id = c.id")
//!         .with_execution_time(Duration::from_secs(40)),
//! ];
//!
//! let advisor = PartitionAdvisor::new(AdvisorConfig::default())?;
//! let report = advisor.run(&[orders], &queries)?;
//! for recommendation in report.recommendations() {
//!     print!("{}", recommendation.to_ddl());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! - [`sql::PredicateExtractor`] parses each query and reports the columns used
//!   in JOIN and WHERE predicates, resolved to their base tables
//! - [`analyzers::QueryClassifier`] labels queries interactive or batch
//! - [`analyzers::UsageAggregator`] folds per-query mentions into per-column counts
//! - [`analyzers::CardinalityAnalyzer`], [`analyzers::DistributionAnalyzer`] and
//!   [`analyzers::ResourceImpactAnalyzer`] compute the per-column factors
//! - [`analyzers::ScoringEngine`] combines them into a ranked composite score
//! - [`recommend::PartitionSpecGenerator`] picks the top columns and their transforms
//!
//! [`core::PartitionAdvisor`] drives the pipeline per table, sequentially or
//! with one worker per table on a tokio runtime.
//!
//! ## Data Sources
//!
//! The `sources` module defines the collaborator traits
//! ([`sources::QueryLogSource`], [`sources::CatalogSource`]) together with an
//! in-memory implementation and DataFusion-backed readers that profile
//! registered tables and read a registered query-log table.
//!
//! ## Logging
//!
//! All components emit `tracing` events. Embedding binaries can install a
//! subscriber with [`logging::setup::init_logging`].

pub mod analyzers;
pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod recommend;
pub mod security;
pub mod sources;
pub mod sql;
