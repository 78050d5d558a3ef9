//! Collaborator boundary: where queries and catalog metadata come from.
//!
//! The advisor itself only consumes [`QueryRecord`]s and [`TableDescriptor`]s.
//! These traits describe the collaborators that produce them, so the engine
//! connection, the query-log store and the catalog can be swapped without
//! touching the analysis.
//!
//! - [`InMemorySource`] serves both from memory (tests, demos, callers that
//!   already hold the data).
//! - [`DataFusionCatalog`] profiles tables registered with a DataFusion
//!   `SessionContext`.
//! - [`DataFusionQueryLog`] reads a registered query-log table.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::core::{QueryRecord, TableDescriptor};
use crate::error::Result;

mod datafusion_source;

pub use datafusion_source::{DataFusionCatalog, DataFusionQueryLog, QueryLogColumns};

/// Produces the query corpus.
///
/// # Examples
///
/// ```rust
/// use term_partition::core::QueryRecord;
/// use term_partition::sources::{InMemorySource, QueryLogSource};
///
/// # #[tokio::main]
/// # async fn main() {
/// let source = InMemorySource::new().with_query(QueryRecord::new("q1", "SELECT 1"));
/// assert_eq!(source.load_queries().await.unwrap().len(), 1);
/// # }
/// ```
#[async_trait]
pub trait QueryLogSource: Debug + Send + Sync {
    async fn load_queries(&self) -> Result<Vec<QueryRecord>>;

    /// Human-readable description of the source.
    fn description(&self) -> String;
}

/// Produces table and column metadata.
#[async_trait]
pub trait CatalogSource: Debug + Send + Sync {
    async fn load_tables(&self) -> Result<Vec<TableDescriptor>>;

    fn description(&self) -> String;
}

/// Queries and tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    queries: Vec<QueryRecord>,
    tables: Vec<TableDescriptor>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: QueryRecord) -> Self {
        self.queries.push(query);
        self
    }

    pub fn with_queries(mut self, queries: impl IntoIterator<Item = QueryRecord>) -> Self {
        self.queries.extend(queries);
        self
    }

    pub fn with_table(mut self, table: TableDescriptor) -> Self {
        self.tables.push(table);
        self
    }
}

#[async_trait]
impl QueryLogSource for InMemorySource {
    async fn load_queries(&self) -> Result<Vec<QueryRecord>> {
        Ok(self.queries.clone())
    }

    fn description(&self) -> String {
        format!("in-memory query log ({} queries)", self.queries.len())
    }
}

#[async_trait]
impl CatalogSource for InMemorySource {
    async fn load_tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.tables.clone())
    }

    fn description(&self) -> String {
        format!("in-memory catalog ({} tables)", self.tables.len())
    }
}
