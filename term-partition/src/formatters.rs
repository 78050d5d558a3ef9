//! Report formatting.
//!
//! Renders an [`AdvisorReport`] as JSON for downstream tooling, as plain text
//! for a console, or as Markdown for review documents.
//!
//! # Examples
//!
//! ```rust
//! use term_partition::config::AdvisorConfig;
//! use term_partition::core::{ColumnDescriptor, PartitionAdvisor, TableDescriptor};
//! use term_partition::formatters::{HumanFormatter, ReportFormatter};
//!
//! let table = TableDescriptor::new("orders")
//!     .with_column(ColumnDescriptor::new("orders", "order_date", "date").with_distinct_count(400));
//! let report = PartitionAdvisor::new(AdvisorConfig::default())
//!     .unwrap()
//!     .run(&[table], &[])
//!     .unwrap();
//!
//! let text = HumanFormatter::new().format(&report).unwrap();
//! assert!(text.contains("months(order_date)"));
//! ```

use std::fmt::Write;

use serde::Serialize;

use crate::analyzers::ColumnScore;
use crate::core::report::{
    AdvisorReport, ExtractionStats, ReportMetadata, TableAnalysis, TableDiagnostics, TableFailure,
};
use crate::error::{Result, TermError};
use crate::recommend::PartitionRecommendation;

/// Options shared by every formatter.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the factor breakdown of each recommended column.
    pub include_evidence: bool,
    /// Include per-table and corpus diagnostics.
    pub include_diagnostics: bool,
    /// Include the full ranking, not only the recommended columns.
    pub include_all_scores: bool,
    /// Maximum number of tables to show (`None` for all).
    pub max_tables: Option<usize>,
    pub include_timestamps: bool,
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_evidence: true,
            include_diagnostics: true,
            include_all_scores: false,
            max_tables: None,
            include_timestamps: true,
            use_colors: false,
        }
    }
}

impl FormatterConfig {
    /// Recommendations only.
    pub fn minimal() -> Self {
        Self {
            include_evidence: false,
            include_diagnostics: false,
            include_all_scores: false,
            max_tables: None,
            include_timestamps: false,
            use_colors: false,
        }
    }

    pub fn detailed() -> Self {
        Self {
            include_all_scores: true,
            ..Self::default()
        }
    }

    pub fn with_evidence(mut self, include: bool) -> Self {
        self.include_evidence = include;
        self
    }

    pub fn with_diagnostics(mut self, include: bool) -> Self {
        self.include_diagnostics = include;
        self
    }

    pub fn with_max_tables(mut self, max: usize) -> Self {
        self.max_tables = Some(max);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn visible_tables<'a>(&self, report: &'a AdvisorReport) -> &'a [TableAnalysis] {
        match self.max_tables {
            Some(max) => &report.tables[..max.min(report.tables.len())],
            None => &report.tables,
        }
    }
}

/// Turns an advisor report into text.
pub trait ReportFormatter {
    fn format(&self, report: &AdvisorReport) -> Result<String>;

    /// Formats with explicit options. The default ignores them.
    fn format_with_config(&self, report: &AdvisorReport, _config: &FormatterConfig) -> Result<String> {
        self.format(report)
    }
}

fn format_error(e: std::fmt::Error) -> TermError {
    TermError::Internal(format!("Failed to format report: {e}"))
}

/// Structured JSON output.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Report view restricted by a [`FormatterConfig`].
#[derive(Serialize)]
struct JsonReport<'a> {
    tables: Vec<JsonTable<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a ExtractionStats>,
    failures: &'a [TableFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a ReportMetadata>,
}

#[derive(Serialize)]
struct JsonTable<'a> {
    table: &'a str,
    recommendation: &'a PartitionRecommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    scores: Option<&'a [ColumnScore]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a TableDiagnostics>,
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &AdvisorReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &AdvisorReport, config: &FormatterConfig) -> Result<String> {
        let view = JsonReport {
            tables: config
                .visible_tables(report)
                .iter()
                .map(|t| JsonTable {
                    table: &t.table,
                    recommendation: &t.recommendation,
                    scores: config.include_all_scores.then_some(t.scores.as_slice()),
                    diagnostics: config.include_diagnostics.then_some(&t.diagnostics),
                })
                .collect(),
            stats: config.include_diagnostics.then_some(&report.stats),
            failures: &report.failures,
            metadata: config.include_timestamps.then_some(&report.metadata),
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&view)
        } else {
            serde_json::to_string(&view)
        };
        json.map_err(|e| TermError::Serialization(format!("Failed to serialize report to JSON: {e}")))
    }
}

/// Console output.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn render(report: &AdvisorReport, config: &FormatterConfig, out: &mut String) -> std::fmt::Result {
        let (bold, reset) = if config.use_colors {
            ("\x1b[1m", "\x1b[0m")
        } else {
            ("", "")
        };

        writeln!(out, "{bold}Partition recommendations{reset}")?;
        if config.include_timestamps {
            writeln!(out, "Generated: {}", report.metadata.finished_at)?;
        }
        if config.include_diagnostics {
            let stats = &report.stats;
            writeln!(
                out,
                "Queries: {} total, {} parsed, {} failed to parse, {} unresolved references",
                stats.total_queries, stats.parsed, stats.parse_failures, stats.unresolved_references
            )?;
        }

        for table in config.visible_tables(report) {
            writeln!(out)?;
            writeln!(out, "{bold}{}{reset}", table.table)?;
            let recommendation = &table.recommendation;
            if recommendation.is_empty() {
                writeln!(
                    out,
                    "  no suitable partition column ({} candidates considered)",
                    recommendation.candidates_considered
                )?;
            }
            for column in &recommendation.columns {
                writeln!(
                    out,
                    "  {}. {:<32} score {:.3}",
                    column.rank, column.field, column.score.composite
                )?;
                if config.include_evidence {
                    writeln!(out, "     {}", column.evidence)?;
                }
            }
            if config.include_all_scores {
                writeln!(out, "  ranking:")?;
                for score in &table.scores {
                    writeln!(out, "    {:<24} {:.3}", score.column, score.composite)?;
                }
            }
            if config.include_diagnostics {
                let d = &table.diagnostics;
                writeln!(
                    out,
                    "  queries: {}, parse failures: {}, unresolved: {}{}",
                    d.query_count,
                    d.parse_failures,
                    d.unresolved_references,
                    if d.empty_corpus { ", no usage data" } else { "" }
                )?;
            }
        }

        let hidden = report.tables.len() - config.visible_tables(report).len();
        if hidden > 0 {
            writeln!(out)?;
            writeln!(out, "... and {hidden} more tables")?;
        }

        if report.has_failures() {
            writeln!(out)?;
            writeln!(out, "Failed tables:")?;
            for failure in &report.failures {
                writeln!(out, "  {}: {}", failure.table, failure.error)?;
            }
        }
        Ok(())
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, report: &AdvisorReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &AdvisorReport, config: &FormatterConfig) -> Result<String> {
        let mut out = String::new();
        Self::render(report, config, &mut out).map_err(format_error)?;
        Ok(out)
    }
}

/// Markdown output, one section per table.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the base heading level, clamped to `1..=5`.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 5);
        self
    }

    fn render(&self, report: &AdvisorReport, config: &FormatterConfig, out: &mut String) -> std::fmt::Result {
        let h = "#".repeat(self.heading_level as usize);

        writeln!(out, "{h} Partition Recommendations")?;
        if config.include_timestamps {
            writeln!(out)?;
            writeln!(out, "**Generated:** {}", report.metadata.finished_at)?;
        }
        if config.include_diagnostics {
            let stats = &report.stats;
            writeln!(out)?;
            writeln!(out, "| Queries | Parsed | Parse failures | Unresolved references |")?;
            writeln!(out, "|---------|--------|----------------|-----------------------|")?;
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                stats.total_queries, stats.parsed, stats.parse_failures, stats.unresolved_references
            )?;
        }

        for table in config.visible_tables(report) {
            writeln!(out)?;
            writeln!(out, "{h}# `{}`", table.table)?;
            writeln!(out)?;
            let recommendation = &table.recommendation;
            if recommendation.is_empty() {
                writeln!(out, "_No suitable partition column found._")?;
            } else {
                writeln!(out, "| Rank | Partition field | Score |")?;
                writeln!(out, "|------|-----------------|-------|")?;
                for column in &recommendation.columns {
                    writeln!(
                        out,
                        "| {} | `{}` | {:.3} |",
                        column.rank, column.field, column.score.composite
                    )?;
                }
                if config.include_evidence {
                    writeln!(out)?;
                    for column in &recommendation.columns {
                        writeln!(out, "- `{}`: {}", column.column, column.evidence)?;
                    }
                }
            }
            if config.include_diagnostics && table.diagnostics.empty_corpus {
                writeln!(out)?;
                writeln!(out, "> No query referenced this table; ranking uses catalog statistics only.")?;
            }
        }

        if report.has_failures() {
            writeln!(out)?;
            writeln!(out, "{h}# Failed tables")?;
            writeln!(out)?;
            for failure in &report.failures {
                writeln!(out, "- `{}`: {}", failure.table, failure.error)?;
            }
        }
        Ok(())
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &AdvisorReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &AdvisorReport, config: &FormatterConfig) -> Result<String> {
        let mut out = String::new();
        self.render(report, config, &mut out).map_err(format_error)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdvisorConfig;
    use crate::core::{ColumnDescriptor, PartitionAdvisor, QueryRecord, TableDescriptor};

    fn create_test_report() -> AdvisorReport {
        let orders = TableDescriptor::new("orders")
            .with_row_count(1_000_000)
            .with_column(
                ColumnDescriptor::new("orders", "order_date", "date")
                    .with_distinct_count(1_000)
                    .with_range("2022-01-01", "2024-06-30"),
            )
            .with_column(ColumnDescriptor::new("orders", "note", "varchar"));
        let empty = TableDescriptor::new("audit");
        let queries = vec![QueryRecord::new(
            "q1",
            "SELECT note FROM orders WHERE order_date > '2024-01-01'",
        )];
        let mut report = PartitionAdvisor::new(AdvisorConfig::default())
            .unwrap()
            .run(&[orders, empty], &queries)
            .unwrap();
        report.failures.push(TableFailure {
            table: "broken".into(),
            error: "worker failed".into(),
        });
        report
    }

    #[test]
    fn test_formatter_config() {
        let minimal = FormatterConfig::minimal();
        assert!(!minimal.include_evidence);
        assert!(!minimal.include_diagnostics);

        let detailed = FormatterConfig::detailed().with_max_tables(1);
        assert!(detailed.include_all_scores);
        assert_eq!(detailed.max_tables, Some(1));
    }

    #[test]
    fn test_json_formatter() {
        let report = create_test_report();
        let output = JsonFormatter::new().format(&report).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["tables"][1]["table"], "orders");
        assert_eq!(
            json["tables"][1]["recommendation"]["columns"][0]["field"],
            "months(order_date)"
        );
        assert_eq!(json["stats"]["total_queries"], 1);
        assert!(json["tables"][0].get("scores").is_none());

        let minimal = JsonFormatter::with_config(FormatterConfig::minimal())
            .with_pretty(false)
            .format(&report)
            .unwrap();
        assert!(!minimal.contains('\n'));
        assert!(!minimal.contains("\"stats\""));
    }

    #[test]
    fn test_human_formatter() {
        let report = create_test_report();
        let output = HumanFormatter::new().format(&report).unwrap();

        assert!(output.contains("Partition recommendations"));
        assert!(output.contains("1. months(order_date)"));
        assert!(output.contains("usage 1.000"));
        assert!(output.contains("no suitable partition column"));
        assert!(output.contains("broken: worker failed"));

        let limited = HumanFormatter::with_config(FormatterConfig::minimal().with_max_tables(1))
            .format(&report)
            .unwrap();
        assert!(limited.contains("... and 1 more tables"));
        assert!(!limited.contains("usage 1.000"));

        let mut clean = create_test_report();
        clean.failures.clear();
        let output = HumanFormatter::new().format(&clean).unwrap();
        assert!(!output.contains("Failed tables"));
    }

    #[test]
    fn test_markdown_formatter() {
        let report = create_test_report();
        let output = MarkdownFormatter::new()
            .with_heading_level(1)
            .format(&report)
            .unwrap();

        assert!(output.starts_with("# Partition Recommendations"));
        assert!(output.contains("## `orders`"));
        assert!(output.contains("| 1 | `months(order_date)` |"));
        assert!(output.contains("_No suitable partition column found._"));
        assert!(output.contains("## Failed tables"));
    }
}
