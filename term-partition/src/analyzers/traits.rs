//! Core analyzer traits.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::types::{FactorBounds, FactorValue};
use crate::core::catalog::{ColumnDescriptor, TableDescriptor};
use crate::error::Result;

/// State of a corpus-level analyzer that supports incremental computation.
///
/// States built from disjoint slices of a query corpus can be merged in any
/// order; the merge is commutative and associative, so per-query states may
/// be folded sequentially or in parallel with identical results.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use term_partition::analyzers::AnalyzerState;
/// use term_partition::error::Result;
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct QueryCount {
///     queries: u64,
/// }
///
/// impl AnalyzerState for QueryCount {
///     fn merge(states: Vec<Self>) -> Result<Self> {
///         Ok(QueryCount { queries: states.iter().map(|s| s.queries).sum() })
///     }
///
///     fn is_empty(&self) -> bool {
///         self.queries == 0
///     }
/// }
///
/// let merged = QueryCount::merge(vec![QueryCount { queries: 2 }, QueryCount { queries: 3 }]).unwrap();
/// assert_eq!(merged.queries, 5);
/// ```
pub trait AnalyzerState:
    Clone + Send + Sync + Debug + Serialize + for<'de> Deserialize<'de>
{
    /// Merges multiple states into a single state.
    ///
    /// Fails when the states cannot be combined, for example because they
    /// were built for different tables.
    fn merge(states: Vec<Self>) -> Result<Self>
    where
        Self: Sized;

    /// Returns whether this state represents an empty computation.
    fn is_empty(&self) -> bool {
        false
    }
}

/// A per-column factor computed from catalog statistics alone.
pub trait ColumnFactor: Send + Sync + Debug {
    /// Returns the name of this factor, used in evidence strings.
    fn name(&self) -> &str;

    /// Range every computed value stays within.
    fn bounds(&self) -> FactorBounds;

    /// Value used when the statistic the factor needs is missing.
    fn neutral(&self) -> f64;

    /// Computes the factor for `column` of `table`.
    fn compute(&self, column: &ColumnDescriptor, table: &TableDescriptor) -> FactorValue;
}
