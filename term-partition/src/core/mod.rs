//! Core data model and the advisor that drives the pipeline.

pub mod advisor;
pub mod catalog;
pub mod names;
pub mod query;
pub mod report;

pub use advisor::PartitionAdvisor;
pub use catalog::{ColumnDescriptor, ColumnType, TableDescriptor, ValueFrequency, ValueHistogram};
pub use query::QueryRecord;
pub use report::{
    AdvisorReport, ExtractionStats, ReportMetadata, TableAnalysis, TableDiagnostics, TableFailure,
};
