//! Logging configuration for the partition advisor.
//!
//! The advisor emits `tracing` events at three levels of detail: a per-table
//! summary at `info`, per-query diagnostics (parse failures, unresolved
//! references) at `debug`, and per-column factor breakdowns at `trace`.
//! [`LogConfig`] decides which of the noisier groups are emitted at all so a
//! large query log does not flood the output.

use tracing::Level;

/// Verbosity switches consulted by the advisor while it runs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Most verbose level the advisor emits; detail switches above it are ignored
    pub base_level: Level,
    /// Whether to log one event per query that fails to parse or has
    /// unresolved column references
    pub log_query_details: bool,
    /// Whether to log the factor breakdown of every scored column
    pub log_factor_details: bool,
    /// Whether to log the per-table summary once a table is finished
    pub log_table_summary: bool,
    /// Maximum length for logged SQL text
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_query_details: false,
            log_factor_details: false,
            log_table_summary: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Logs everything, including the SQL of every rejected query.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::TRACE,
            log_query_details: true,
            log_factor_details: true,
            log_table_summary: true,
            max_field_length: 1024,
        }
    }

    /// Only warnings. Suitable for scheduled runs over very large logs.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_query_details: false,
            log_factor_details: false,
            log_table_summary: false,
            max_field_length: 128,
        }
    }

    /// Whether `level` is at or above the configured base verbosity.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.base_level
    }

    /// Per-query diagnostics are `debug` events.
    pub fn logs_queries(&self) -> bool {
        self.log_query_details && self.enabled(Level::DEBUG)
    }

    /// Factor breakdowns are `trace` events.
    pub fn logs_factors(&self) -> bool {
        self.log_factor_details && self.enabled(Level::TRACE)
    }

    pub fn logs_table_summary(&self) -> bool {
        self.log_table_summary && self.enabled(Level::INFO)
    }
}

/// Logs a per-query diagnostic when [`LogConfig::log_query_details`] is set
/// and the base level admits `debug`.
#[macro_export]
macro_rules! log_query {
    ($config:expr, $($arg:tt)*) => {
        if $config.logs_queries() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a per-column factor breakdown when [`LogConfig::log_factor_details`]
/// is set and the base level admits `trace`.
#[macro_export]
macro_rules! log_factors {
    ($config:expr, $($arg:tt)*) => {
        if $config.logs_factors() {
            tracing::trace!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes, respecting char boundaries.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for binaries and demos embedding the advisor.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global `tracing` subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything outside the advisor
        pub level: Level,
        /// Log level for `term_partition` targets
        pub advisor_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                advisor_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output, warnings only outside the advisor.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                advisor_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                advisor_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_advisor_level(mut self, level: Level) -> Self {
            self.advisor_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter, replacing the generated one.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},term_partition={}",
                    self.level.as_str().to_lowercase(),
                    self.advisor_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global subscriber. `RUST_LOG` wins over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_partition::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
