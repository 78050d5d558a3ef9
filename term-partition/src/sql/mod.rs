//! SQL text analysis.

pub mod extractor;

pub use extractor::{ColumnRef, ExtractedColumns, Extraction, PredicateExtractor};
