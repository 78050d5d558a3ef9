//! Advisor configuration.
//!
//! [`AdvisorConfig`] groups the settings of every pipeline stage. Every field
//! has a default, so a JSON document only needs the values it overrides:
//!
//! ```rust
//! use term_partition::config::AdvisorConfig;
//!
//! let config = AdvisorConfig::from_json_str(r#"{ "top_n": 2, "scoring": { "predicate_bonus": 0.3 } }"#).unwrap();
//! assert_eq!(config.top_n, 2);
//! assert_eq!(config.scoring.predicate_bonus, 0.3);
//! assert_eq!(config.transform.max_bucket_count, 128);
//! ```
//!
//! Invalid values are rejected by [`AdvisorConfig::validate`] before any
//! analysis runs.

use serde::{Deserialize, Serialize};

use crate::analyzers::{
    CardinalityConfig, ClassifierConfig, ResourceConfig, ScoringWeights, SkewConfig, SkewStatistic,
};
use crate::error::{Result, TermError};
use crate::recommend::TransformConfig;

/// Complete configuration of a [`PartitionAdvisor`](crate::core::PartitionAdvisor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Number of partition columns recommended per table.
    pub top_n: usize,
    pub scoring: ScoringWeights,
    pub cardinality: CardinalityConfig,
    pub skew: SkewConfig,
    pub resource: ResourceConfig,
    pub classifier: ClassifierConfig,
    pub transform: TransformConfig,
    /// Upper bound on concurrent table workers in parallel runs.
    pub max_parallel_tables: Option<usize>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            scoring: ScoringWeights::default(),
            cardinality: CardinalityConfig::default(),
            skew: SkewConfig::default(),
            resource: ResourceConfig::default(),
            classifier: ClassifierConfig::default(),
            transform: TransformConfig::default(),
            max_parallel_tables: None,
        }
    }
}

impl AdvisorConfig {
    pub fn builder() -> AdvisorConfigBuilder {
        AdvisorConfigBuilder::default()
    }

    /// Favours columns used by dashboards: a wider resource range, a heavier
    /// interactive weight and a larger predicate bonus.
    pub fn interactive_first() -> Self {
        Self {
            scoring: ScoringWeights {
                predicate_bonus: 0.3,
                ..ScoringWeights::default()
            },
            resource: ResourceConfig {
                min_multiplier: 0.25,
                max_multiplier: 1.75,
                ..ResourceConfig::default()
            },
            classifier: ClassifierConfig {
                interactive_weight: 4.0,
                limit_hint: true,
                ..ClassifierConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects configurations the analysis cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(invalid("top_n must be at least 1"));
        }
        if self.max_parallel_tables == Some(0) {
            return Err(invalid("max_parallel_tables must be at least 1"));
        }

        let scoring = &self.scoring;
        finite("scoring.usage_exponent", scoring.usage_exponent)?;
        finite("scoring.predicate_bonus", scoring.predicate_bonus)?;
        finite("scoring.min_score", scoring.min_score)?;
        if scoring.usage_exponent <= 0.0 {
            return Err(invalid("scoring.usage_exponent must be positive"));
        }
        if scoring.predicate_bonus < 0.0 {
            return Err(invalid("scoring.predicate_bonus must not be negative"));
        }

        let cardinality = &self.cardinality;
        finite("cardinality.band_low", cardinality.band_low)?;
        finite("cardinality.band_high", cardinality.band_high)?;
        if !(cardinality.band_low > 0.0
            && cardinality.band_low < cardinality.band_high
            && cardinality.band_high <= 1.0)
        {
            return Err(invalid(format!(
                "cardinality band must satisfy 0 < low < high <= 1, got [{}, {}]",
                cardinality.band_low, cardinality.band_high
            )));
        }
        positive("cardinality.low_side_width", cardinality.low_side_width)?;
        positive("cardinality.high_side_width", cardinality.high_side_width)?;
        unit_interval("cardinality.neutral", cardinality.neutral)?;

        unit_interval("skew.min_factor", self.skew.min_factor)?;
        if !(self.skew.min_factor..=1.0).contains(&self.skew.neutral) {
            return Err(invalid("skew.neutral must lie within [skew.min_factor, 1]"));
        }
        if let SkewStatistic::TopKShare { k } = self.skew.statistic {
            if k == 0 {
                return Err(invalid("skew.statistic.k must be at least 1"));
            }
        }

        let resource = &self.resource;
        let weights = &resource.weights;
        for (name, value) in [
            ("resource.weights.execution_time", weights.execution_time),
            ("resource.weights.cpu_time", weights.cpu_time),
            ("resource.weights.input_bytes", weights.input_bytes),
            ("resource.weights.peak_memory", weights.peak_memory),
        ] {
            non_negative(name, value)?;
        }
        if weights.total() <= 0.0 {
            return Err(invalid("resource.weights must not all be zero"));
        }
        non_negative("resource.min_multiplier", resource.min_multiplier)?;
        finite("resource.max_multiplier", resource.max_multiplier)?;
        if resource.min_multiplier > resource.max_multiplier {
            return Err(invalid(
                "resource.min_multiplier must not exceed resource.max_multiplier",
            ));
        }

        let classifier = &self.classifier;
        if classifier.interactive_threshold_ms == 0 {
            return Err(invalid("classifier.interactive_threshold_ms must be positive"));
        }
        non_negative("classifier.interactive_weight", classifier.interactive_weight)?;
        non_negative("classifier.batch_weight", classifier.batch_weight)?;

        let transform = &self.transform;
        if transform.distinct_per_bucket == 0 {
            return Err(invalid("transform.distinct_per_bucket must be positive"));
        }
        if transform.min_bucket_count == 0 || transform.min_bucket_count > transform.max_bucket_count {
            return Err(invalid(
                "transform bucket counts must satisfy 0 < min_bucket_count <= max_bucket_count",
            ));
        }
        if transform.days_max_span_days < 0
            || transform.days_max_span_days > transform.months_max_span_days
        {
            return Err(invalid(
                "transform spans must satisfy 0 <= days_max_span_days <= months_max_span_days",
            ));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> TermError {
    TermError::invalid_config(message)
}

fn finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite, got {value}")))
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must not be negative, got {value}")))
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    finite(name, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must lie within [0, 1], got {value}")))
    }
}

/// Builder for [`AdvisorConfig`].
#[derive(Debug, Clone, Default)]
pub struct AdvisorConfigBuilder {
    config: AdvisorConfig,
}

impl AdvisorConfigBuilder {
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.config.top_n = top_n;
        self
    }

    pub fn scoring(mut self, scoring: ScoringWeights) -> Self {
        self.config.scoring = scoring;
        self
    }

    pub fn predicate_bonus(mut self, weight: f64) -> Self {
        self.config.scoring.predicate_bonus = weight;
        self
    }

    pub fn cardinality(mut self, cardinality: CardinalityConfig) -> Self {
        self.config.cardinality = cardinality;
        self
    }

    pub fn skew(mut self, skew: SkewConfig) -> Self {
        self.config.skew = skew;
        self
    }

    pub fn skew_statistic(mut self, statistic: SkewStatistic) -> Self {
        self.config.skew.statistic = statistic;
        self
    }

    pub fn resource(mut self, resource: ResourceConfig) -> Self {
        self.config.resource = resource;
        self
    }

    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.config.classifier = classifier;
        self
    }

    /// Sets the interactive threshold in milliseconds.
    pub fn interactive_threshold_ms(mut self, millis: u64) -> Self {
        self.config.classifier.interactive_threshold_ms = millis;
        self
    }

    pub fn transform(mut self, transform: TransformConfig) -> Self {
        self.config.transform = transform;
        self
    }

    pub fn high_cardinality_threshold(mut self, threshold: u64) -> Self {
        self.config.transform.high_cardinality_threshold = threshold;
        self
    }

    pub fn max_bucket_count(mut self, max: u32) -> Self {
        self.config.transform.max_bucket_count = max;
        self
    }

    pub fn max_parallel_tables(mut self, max: usize) -> Self {
        self.config.max_parallel_tables = Some(max);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<AdvisorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(config: AdvisorConfig, fragment: &str) {
        match config.validate() {
            Err(TermError::InvalidConfiguration(message)) => {
                assert!(message.contains(fragment), "{message} lacks {fragment}")
            }
            other => panic!("expected invalid configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AdvisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_n, 3);
        assert_eq!(config.classifier.interactive_threshold_ms, 10_000);
        assert_eq!(config.transform.high_cardinality_threshold, 10_000);
        assert_eq!(config.transform.max_bucket_count, 128);
        assert!(AdvisorConfig::interactive_first().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_top_n() {
        assert_invalid(
            AdvisorConfig {
                top_n: 0,
                ..AdvisorConfig::default()
            },
            "top_n",
        );
        assert!(AdvisorConfig::builder().top_n(0).build().is_err());
    }

    #[test]
    fn test_rejects_inverted_band() {
        let mut config = AdvisorConfig::default();
        config.cardinality.band_low = 0.1;
        config.cardinality.band_high = 0.01;
        assert_invalid(config, "cardinality band");
    }

    #[test]
    fn test_rejects_negative_weights() {
        let mut config = AdvisorConfig::default();
        config.resource.weights.cpu_time = -0.1;
        assert_invalid(config, "resource.weights.cpu_time");

        let mut config = AdvisorConfig::default();
        config.scoring.predicate_bonus = -1.0;
        assert_invalid(config, "predicate_bonus");

        let mut config = AdvisorConfig::default();
        config.resource.weights = crate::analyzers::MetricWeights {
            execution_time: 0.0,
            cpu_time: 0.0,
            input_bytes: 0.0,
            peak_memory: 0.0,
        };
        assert_invalid(config, "all be zero");
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let mut config = AdvisorConfig::default();
        config.scoring.usage_exponent = f64::NAN;
        assert_invalid(config, "finite");
    }

    #[test]
    fn test_rejects_bad_buckets_and_multipliers() {
        let mut config = AdvisorConfig::default();
        config.transform.min_bucket_count = 256;
        assert_invalid(config, "bucket counts");

        let mut config = AdvisorConfig::default();
        config.resource.min_multiplier = 2.0;
        assert_invalid(config, "min_multiplier");

        let mut config = AdvisorConfig::default();
        config.skew.statistic = SkewStatistic::TopKShare { k: 0 };
        assert_invalid(config, "k must be");
    }

    #[test]
    fn test_builder() {
        let config = AdvisorConfig::builder()
            .top_n(2)
            .interactive_threshold_ms(5_000)
            .max_bucket_count(64)
            .skew_statistic(SkewStatistic::Gini)
            .build()
            .unwrap();
        assert_eq!(config.top_n, 2);
        assert_eq!(config.classifier.interactive_threshold_ms, 5_000);
        assert_eq!(config.transform.max_bucket_count, 64);
        assert_eq!(config.skew.statistic, SkewStatistic::Gini);
    }

    #[test]
    fn test_json_round_trip_and_partial_documents() {
        let config = AdvisorConfig::interactive_first();
        let json = config.to_json_string().unwrap();
        assert_eq!(AdvisorConfig::from_json_str(&json).unwrap(), config);

        let partial =
            AdvisorConfig::from_json_str(r#"{"skew": {"statistic": {"kind": "gini"}}}"#).unwrap();
        assert_eq!(partial.skew.statistic, SkewStatistic::Gini);
        assert_eq!(partial.skew.min_factor, 0.1);

        assert!(matches!(
            AdvisorConfig::from_json_str(r#"{"top_n": 0}"#),
            Err(TermError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            AdvisorConfig::from_json_str("{not json"),
            Err(TermError::Serialization(_))
        ));
    }
}
