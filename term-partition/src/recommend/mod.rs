//! Partition specification generation: column selection and transforms.

pub mod generator;
pub mod transform;

pub use generator::{PartitionRecommendation, PartitionSpecGenerator, RecommendedColumn};
pub use transform::{PartitionTransform, TransformConfig, TransformSelector};
