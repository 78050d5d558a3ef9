//! Property-based tests for the analyzers and the scoring engine.
//!
//! The properties checked here hold for every input:
//! - factors stay inside their declared bounds
//! - usage counts are consistent (interactive + batch = global, predicate <= global)
//! - folding query usage is independent of query order
//! - a dominated histogram is penalised against a uniform one
//! - the extractor never panics, whatever the input text

use std::collections::BTreeSet;

use proptest::prelude::*;
use term_partition::analyzers::{
    CardinalityAnalyzer, ColumnFactor, DistributionAnalyzer, QueryKind, QueryResources,
    QueryUsage, ResourceConfig, ResourceImpactAnalyzer, ResourceSample, ScoringEngine,
    ScoringWeights, SkewConfig, SkewStatistic, UsageAggregator,
};
use term_partition::core::{ColumnDescriptor, TableDescriptor, ValueHistogram};
use term_partition::sql::PredicateExtractor;

const COLUMNS: [&str; 6] = ["id", "order_date", "customer_id", "status", "total", "region"];

fn column_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::sample::subsequence(COLUMNS.to_vec(), 0..=COLUMNS.len())
        .prop_map(|cols| cols.into_iter().map(String::from).collect())
}

fn query_usage() -> impl Strategy<Value = QueryUsage> {
    (
        "[a-z]{1,6}",
        any::<bool>(),
        column_set(),
        column_set(),
        column_set(),
    )
        .prop_map(|(id, interactive, referenced, joins, filters)| {
            let mut all = referenced;
            all.extend(joins.iter().cloned());
            all.extend(filters.iter().cloned());
            QueryUsage {
                query_id: id,
                kind: if interactive {
                    QueryKind::Interactive
                } else {
                    QueryKind::Batch
                },
                referenced: all,
                join_columns: joins,
                filter_columns: filters,
            }
        })
}

fn resource_sample() -> impl Strategy<Value = ResourceSample> {
    (
        0.0..1e7f64,
        0.0..1e7f64,
        0.0..1e12f64,
        0.0..1e10f64,
        prop_oneof![Just(1.0), Just(2.0)],
        column_set(),
    )
        .prop_map(|(execution_ms, cpu_ms, input_bytes, memory, weight, columns)| ResourceSample {
            query_id: "q".to_string(),
            resources: QueryResources {
                execution_ms,
                cpu_ms,
                input_bytes,
                peak_memory_bytes: memory,
            },
            class_weight: weight,
            columns,
        })
}

fn histogram() -> impl Strategy<Value = ValueHistogram> {
    prop::collection::vec(1u64..1_000_000, 1..40).prop_map(|counts| {
        ValueHistogram::from_counts(
            counts
                .into_iter()
                .enumerate()
                .map(|(i, count)| (format!("v{i}"), count)),
        )
    })
}

proptest! {
    #[test]
    fn prop_cardinality_factor_is_bounded(distinct in 0u64..u64::MAX, rows in 0u64..u64::MAX) {
        let analyzer = CardinalityAnalyzer::default();
        let factor = analyzer.factor(Some(distinct), Some(rows));
        prop_assert!(analyzer.bounds().contains(factor.value), "{} / {} -> {}", distinct, rows, factor.value);
    }

    #[test]
    fn prop_skew_factor_is_bounded(histogram in histogram(), gini in any::<bool>(), k in 1usize..10) {
        let statistic = if gini { SkewStatistic::Gini } else { SkewStatistic::TopKShare { k } };
        let config = SkewConfig { statistic, ..SkewConfig::default() };
        let analyzer = DistributionAnalyzer::new(config.clone());
        let factor = analyzer.factor(Some(&histogram));
        prop_assert!(factor.value >= config.min_factor - 1e-12);
        prop_assert!(factor.value <= 1.0 + 1e-12);
    }

    #[test]
    fn prop_dominant_value_is_penalised(others in 1usize..50, per_value in 1u64..10_000, gini in any::<bool>()) {
        let statistic = if gini { SkewStatistic::Gini } else { SkewStatistic::TopKShare { k: 3 } };
        let analyzer = DistributionAnalyzer::new(SkewConfig { statistic, ..SkewConfig::default() });

        let uniform = ValueHistogram::from_counts(
            (0..=others).map(|i| (format!("v{i}"), per_value)),
        );
        // The first value holds 90% of the rows.
        let dominant_count = 9 * per_value * others as u64;
        let dominated = ValueHistogram::from_counts(
            std::iter::once(("v0".to_string(), dominant_count))
                .chain((1..=others).map(|i| (format!("v{i}"), per_value))),
        );

        let uniform_factor = analyzer.factor(Some(&uniform)).value;
        let dominated_factor = analyzer.factor(Some(&dominated)).value;
        prop_assert!(dominated_factor < uniform_factor,
            "dominated {} vs uniform {}", dominated_factor, uniform_factor);
    }

    #[test]
    fn prop_resource_multiplier_is_bounded(samples in prop::collection::vec(resource_sample(), 0..20)) {
        let analyzer = ResourceImpactAnalyzer::new(ResourceConfig::default());
        let impact = analyzer.analyze(samples).unwrap();
        for column in COLUMNS {
            let value = impact.multiplier(column).value;
            prop_assert!(analyzer.bounds().contains(value), "{} -> {}", column, value);
        }
    }

    #[test]
    fn prop_usage_counts_are_consistent(queries in prop::collection::vec(query_usage(), 0..30)) {
        let summary = UsageAggregator::new("orders").aggregate(&queries).unwrap();
        prop_assert_eq!(summary.query_count, queries.len() as u64);
        for stat in summary.stats.values() {
            prop_assert_eq!(stat.interactive_mentions + stat.batch_mentions, stat.global_mentions);
            prop_assert!(stat.predicate_mentions <= stat.global_mentions);
            prop_assert!(stat.join_mentions <= stat.predicate_mentions);
            prop_assert!(stat.filter_mentions <= stat.predicate_mentions);
            prop_assert!(stat.global_mentions <= summary.max_global);
        }
    }

    #[test]
    fn prop_usage_is_order_independent(queries in prop::collection::vec(query_usage(), 0..30)) {
        let aggregator = UsageAggregator::new("orders");
        let forward = aggregator.aggregate(&queries).unwrap();
        let mut reversed = queries.clone();
        reversed.reverse();
        prop_assert_eq!(forward, aggregator.aggregate(&reversed).unwrap());
    }

    #[test]
    fn prop_scores_are_ranked(
        queries in prop::collection::vec(query_usage(), 0..20),
        samples in prop::collection::vec(resource_sample(), 0..20),
        distincts in prop::collection::vec(0u64..20_000_000, COLUMNS.len()),
    ) {
        let mut table = TableDescriptor::new("orders").with_row_count(10_000_000);
        for (name, distinct) in COLUMNS.iter().zip(distincts) {
            table = table.with_column(
                ColumnDescriptor::new("orders", *name, "bigint").with_distinct_count(distinct),
            );
        }
        let usage = UsageAggregator::new("orders").aggregate(&queries).unwrap();
        let impact = ResourceImpactAnalyzer::default().analyze(samples).unwrap();
        let engine = ScoringEngine::new(
            ScoringWeights::default(),
            CardinalityAnalyzer::default(),
            DistributionAnalyzer::default(),
        );

        let scores = engine.score_table(&table, &usage, &impact);
        prop_assert_eq!(scores.len(), COLUMNS.len());
        let ceiling = engine.max_composite(ResourceConfig::default().max_multiplier);
        for pair in scores.windows(2) {
            prop_assert!(pair[0].composite >= pair[1].composite);
        }
        for score in &scores {
            prop_assert!(score.composite >= 0.0 && score.composite <= ceiling + 1e-12);
            prop_assert!(score.predicate_mentions <= score.global_mentions);
        }
    }

    #[test]
    fn prop_extractor_never_panics(sql in "\\PC{0,200}") {
        let extractor = PredicateExtractor::new();
        let _ = extractor.extract(&sql);
    }

    #[test]
    fn prop_filter_columns_are_found(column in prop::sample::select(COLUMNS.to_vec()), value in 0i64..1_000_000) {
        let extractor = PredicateExtractor::new();
        let sql = format!("SELECT * FROM orders WHERE {column} = {value}");
        let extraction = extractor.extract(&sql);
        let columns = extraction.columns().unwrap();
        prop_assert!(columns.filter_columns.iter().any(|c| c.column == column && c.table == "orders"));
    }
}
