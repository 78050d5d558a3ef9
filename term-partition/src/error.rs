//! Error types for the Term partition advisor.
//!
//! Only conditions that stop an invocation are errors. Per-query parse
//! failures, missing column statistics and empty query corpora degrade the
//! analysis instead and are reported through diagnostics on the
//! [`AdvisorReport`](crate::core::AdvisorReport).

use thiserror::Error;

/// The main error type for the partition advisor.
#[derive(Error, Debug)]
pub enum TermError {
    /// The advisor configuration was rejected before any analysis ran.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Error from a catalog or query-log collaborator.
    #[error("Data source error: {message}")]
    DataSource {
        /// Type of data source (e.g., "catalog", "query_log")
        source_type: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error when a required column is not found in a collaborator's output.
    #[error("Column '{column}' not found in '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An identifier or expression was rejected before being embedded in SQL.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| wrap(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(&f(), e.into()))
    }
}

fn wrap(msg: &str, error: TermError) -> TermError {
    match error {
        TermError::DataSource {
            source_type,
            message,
            source,
        } => TermError::DataSource {
            source_type,
            message: format!("{msg}: {message}"),
            source,
        },
        TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
        other => TermError::Internal(format!("{msg}: {other}")),
    }
}
