//! Per-column analyzers and the scoring engine that combines them.
//!
//! ## Available Analyzers
//!
//! - **Usage** (`usage`): per-column mention counts folded over a table's query corpus
//! - **Cardinality** (`cardinality`): suitability of `distinct / rows` as a partition count
//! - **Distribution** (`distribution`): skew penalty from a value-frequency histogram
//! - **Resource impact** (`resource`): multiplier from the cost of the queries touching a column
//! - **Classifier** (`classifier`): interactive/batch labels and their weights
//! - **Scoring** (`scoring`): composite score and ranking
//!
//! Corpus-level analyzers build [`AnalyzerState`]s that merge commutatively;
//! catalog-level analyzers implement [`ColumnFactor`].

pub mod cardinality;
pub mod classifier;
pub mod distribution;
pub mod resource;
pub mod scoring;
pub mod traits;
pub mod types;
pub mod usage;

pub use cardinality::{CardinalityAnalyzer, CardinalityConfig};
pub use classifier::{ClassifierConfig, QueryClassifier, QueryKind};
pub use distribution::{DistributionAnalyzer, SkewConfig, SkewStatistic};
pub use resource::{
    MetricWeights, QueryResources, ResourceConfig, ResourceImpact, ResourceImpactAnalyzer,
    ResourceSample, ResourceState,
};
pub use scoring::{ColumnScore, ScoringEngine, ScoringWeights};
pub use traits::{AnalyzerState, ColumnFactor};
pub use types::{FactorBounds, FactorSource, FactorValue};
pub use usage::{ColumnUsageStat, QueryUsage, UsageAggregator, UsageState, UsageSummary};
