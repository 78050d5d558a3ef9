//! Prelude for commonly used types and traits in term-partition.

pub use crate::analyzers::{AnalyzerState, ColumnFactor, ColumnScore, QueryKind, ScoringWeights};
pub use crate::config::AdvisorConfig;
pub use crate::core::{
    AdvisorReport, ColumnDescriptor, ColumnType, PartitionAdvisor, QueryRecord, TableDescriptor,
    ValueHistogram,
};
pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::formatters::{FormatterConfig, ReportFormatter};
pub use crate::logging::LogConfig;
pub use crate::recommend::{PartitionRecommendation, PartitionTransform};
pub use crate::sources::{CatalogSource, QueryLogSource};
pub use crate::sql::{Extraction, PredicateExtractor};
