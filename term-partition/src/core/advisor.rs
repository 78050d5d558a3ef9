//! Orchestration of the per-table pipeline.
//!
//! The corpus is parsed and classified once. Each table then gets its own
//! usage fold, resource analysis, scoring and specification, so tables can be
//! processed in any order or concurrently and still produce the same report.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::catalog::TableDescriptor;
use super::query::QueryRecord;
use super::report::{
    AdvisorReport, ExtractionStats, ReportMetadata, TableAnalysis, TableDiagnostics, TableFailure,
};
use crate::analyzers::{
    CardinalityAnalyzer, DistributionAnalyzer, QueryClassifier, QueryKind, QueryResources,
    QueryUsage, ResourceImpactAnalyzer, ResourceSample, ScoringEngine, UsageAggregator,
};
use crate::config::AdvisorConfig;
use crate::error::{Result, TermError};
use crate::logging::{truncate_field, LogConfig};
use crate::recommend::{PartitionSpecGenerator, TransformSelector};
use crate::sql::{Extraction, PredicateExtractor};
use crate::{log_factors, log_query};

/// A query after extraction and classification.
#[derive(Debug, Clone)]
struct PreparedQuery {
    record: QueryRecord,
    kind: QueryKind,
    extraction: Extraction,
    /// Target tables of the log record, resolved to catalog names.
    targets: Vec<String>,
}

impl PreparedQuery {
    fn reads(&self, table: &str) -> bool {
        match &self.extraction {
            Extraction::Columns(columns) => columns.reads_table(table),
            Extraction::ParseFailure { .. } => false,
        }
    }

    fn targets(&self, table: &str) -> bool {
        self.targets.iter().any(|t| t == table)
    }
}

#[derive(Debug, Default)]
struct PreparedCorpus {
    queries: Vec<PreparedQuery>,
    stats: ExtractionStats,
}

/// Recommends partition columns for a set of tables from a query corpus.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use term_partition::config::AdvisorConfig;
/// use term_partition::core::{ColumnDescriptor, PartitionAdvisor, QueryRecord, TableDescriptor};
///
/// let table = TableDescriptor::new("events")
///     .with_row_count(1_000_000)
///     .with_column(ColumnDescriptor::new("events", "event_day", "date").with_distinct_count(60))
///     .with_column(ColumnDescriptor::new("events", "payload", "varchar"));
/// let queries = vec![QueryRecord::new("q1", "SELECT payload FROM events WHERE event_day = '2024-01-01'")
///     .with_execution_time(Duration::from_millis(800))];
///
/// let advisor = PartitionAdvisor::new(AdvisorConfig::default()).unwrap();
/// let report = advisor.run(&[table], &queries).unwrap();
/// let events = report.table("events").unwrap();
/// assert_eq!(events.recommendation.columns[0].field, "days(event_day)");
/// ```
#[derive(Debug, Clone)]
pub struct PartitionAdvisor {
    config: AdvisorConfig,
    log_config: LogConfig,
    classifier: QueryClassifier,
    resources: ResourceImpactAnalyzer,
    scoring: ScoringEngine,
    generator: PartitionSpecGenerator,
}

impl PartitionAdvisor {
    /// Validates `config` and builds the pipeline stages from it.
    pub fn new(config: AdvisorConfig) -> Result<Self> {
        config.validate()?;
        let scoring = ScoringEngine::new(
            config.scoring.clone(),
            CardinalityAnalyzer::new(config.cardinality.clone()),
            DistributionAnalyzer::new(config.skew.clone()),
        );
        let generator = PartitionSpecGenerator::new(
            config.top_n,
            config.scoring.min_score,
            TransformSelector::new(config.transform.clone()),
        );
        Ok(Self {
            classifier: QueryClassifier::new(config.classifier.clone()),
            resources: ResourceImpactAnalyzer::new(config.resource.clone()),
            scoring,
            generator,
            log_config: LogConfig::default(),
            config,
        })
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Analyses every table sequentially.
    #[instrument(skip_all, fields(tables = tables.len(), queries = queries.len()))]
    pub fn run(&self, tables: &[TableDescriptor], queries: &[QueryRecord]) -> Result<AdvisorReport> {
        let mut metadata = ReportMetadata::started_now();
        let corpus = self.prepare(tables, queries);

        let mut analyses = Vec::with_capacity(tables.len());
        let mut failures = Vec::new();
        for table in tables {
            match self.analyze_table(table, &corpus) {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => {
                    error!(table = %table.name, error = %e, "Table analysis failed");
                    failures.push(TableFailure {
                        table: table.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        metadata.finished_at = Utc::now();
        Ok(self.assemble(analyses, failures, corpus.stats, metadata))
    }

    /// Analyses tables concurrently, one blocking worker per table.
    ///
    /// The report is identical to [`run`](Self::run) apart from its
    /// timestamps. A worker that panics is reported as a table failure.
    #[instrument(skip_all, fields(tables = tables.len(), queries = queries.len()))]
    pub async fn run_parallel(
        &self,
        tables: &[TableDescriptor],
        queries: &[QueryRecord],
    ) -> Result<AdvisorReport> {
        let mut metadata = ReportMetadata::started_now();
        let corpus = Arc::new(self.prepare(tables, queries));
        let workers = self
            .config
            .max_parallel_tables
            .unwrap_or_else(num_cpus::get)
            .max(1);
        let permits = Arc::new(Semaphore::new(workers));
        debug!(workers, "Starting parallel table analysis");

        let mut tasks = JoinSet::new();
        for table in tables {
            let advisor = self.clone();
            let corpus = Arc::clone(&corpus);
            let permits = Arc::clone(&permits);
            let table = table.clone();

            tasks.spawn(async move {
                let name = table.name.clone();
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return (name, Err(TermError::Internal(format!("worker pool closed: {e}"))))
                    }
                };
                let result =
                    tokio::task::spawn_blocking(move || advisor.analyze_table(&table, &corpus))
                        .await
                        .unwrap_or_else(|e| {
                            Err(TermError::Internal(format!("table worker failed: {e}")))
                        });
                (name, result)
            });
        }

        let mut analyses = Vec::with_capacity(tables.len());
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (table, result) =
                joined.map_err(|e| TermError::Internal(format!("Task join error: {e}")))?;
            match result {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => {
                    error!(table = %table, error = %e, "Table analysis failed");
                    failures.push(TableFailure {
                        table,
                        error: e.to_string(),
                    });
                }
            }
        }

        metadata.finished_at = Utc::now();
        Ok(self.assemble(analyses, failures, corpus.stats.clone(), metadata))
    }

    /// Extracts and classifies every query once.
    fn prepare(&self, tables: &[TableDescriptor], queries: &[QueryRecord]) -> PreparedCorpus {
        let extractor = PredicateExtractor::with_schema(tables);
        let mut corpus = PreparedCorpus::default();

        for record in queries {
            let kind = self.classifier.classify(record);
            let extraction = extractor.extract(&record.sql);
            corpus.stats.total_queries += 1;
            match &extraction {
                Extraction::Columns(columns) => {
                    corpus.stats.parsed += 1;
                    corpus.stats.unresolved_references += columns.unresolved.len();
                    if !columns.unresolved.is_empty() {
                        log_query!(
                            self.log_config,
                            query_id = %record.id,
                            unresolved = ?columns.unresolved,
                            "Skipped unresolved column references"
                        );
                    }
                }
                Extraction::ParseFailure { reason } => {
                    corpus.stats.parse_failures += 1;
                    warn!(
                        query_id = %record.id,
                        reason = %reason,
                        sql = %truncate_field(&record.sql, self.log_config.max_field_length),
                        "Failed to parse query, excluding it from analysis"
                    );
                }
            }
            log_query!(self.log_config, query_id = %record.id, kind = ?kind, "Classified query");
            let targets = record
                .target_tables
                .iter()
                .filter_map(|t| extractor.resolve_table(t))
                .collect();
            corpus.queries.push(PreparedQuery {
                record: record.clone(),
                kind,
                extraction,
                targets,
            });
        }

        debug!(
            total = corpus.stats.total_queries,
            parsed = corpus.stats.parsed,
            failures = corpus.stats.parse_failures,
            "Prepared query corpus"
        );
        corpus
    }

    #[instrument(skip_all, fields(table = %table.name))]
    fn analyze_table(&self, table: &TableDescriptor, corpus: &PreparedCorpus) -> Result<TableAnalysis> {
        let mut diagnostics = TableDiagnostics::default();
        let mut usages = Vec::new();
        let mut samples = Vec::new();

        for query in &corpus.queries {
            let Extraction::Columns(columns) = &query.extraction else {
                if query.targets(&table.name) {
                    diagnostics.parse_failures += 1;
                }
                continue;
            };
            if !query.reads(&table.name) && !query.targets(&table.name) {
                continue;
            }

            diagnostics.query_count += 1;
            diagnostics.unresolved_references += columns.unresolved.len();
            let usage = QueryUsage::from_extraction(&query.record.id, query.kind, &table.name, columns);
            samples.push(ResourceSample {
                query_id: query.record.id.clone(),
                resources: QueryResources::from(&query.record),
                class_weight: self.classifier.weight(query.kind),
                columns: usage.referenced.clone(),
            });
            usages.push(usage);
        }

        let usage = UsageAggregator::new(table.name.clone()).aggregate(&usages)?;
        diagnostics.empty_corpus = usage.is_empty_corpus();
        let impact = self.resources.analyze(samples)?;
        let scores = self.scoring.score_table(table, &usage, &impact);
        for score in &scores {
            log_factors!(self.log_config, column = %score.column, evidence = %score.evidence(), "Column factors");
        }
        let recommendation = self.generator.generate(table, &scores);

        if self.log_config.logs_table_summary() {
            info!(
                queries = diagnostics.query_count,
                parse_failures = diagnostics.parse_failures,
                empty_corpus = diagnostics.empty_corpus,
                partitioning = ?recommendation.partition_fields(),
                "Analysed table"
            );
        }

        Ok(TableAnalysis {
            table: table.name.clone(),
            usage,
            scores,
            recommendation,
            diagnostics,
        })
    }

    fn assemble(
        &self,
        mut analyses: Vec<TableAnalysis>,
        mut failures: Vec<TableFailure>,
        stats: ExtractionStats,
        metadata: ReportMetadata,
    ) -> AdvisorReport {
        analyses.sort_by(|a, b| a.table.cmp(&b.table));
        failures.sort_by(|a, b| a.table.cmp(&b.table));
        info!(
            tables = analyses.len(),
            failures = failures.len(),
            parse_failures = stats.parse_failures,
            "Partition analysis complete"
        );
        AdvisorReport {
            tables: analyses,
            stats,
            failures,
            metadata,
        }
    }
}
