//! Identifier and expression checks for SQL the advisor generates itself.
//!
//! The DataFusion adapters build profiling and query-log SQL from table and
//! column names supplied by the caller. Every name passes through
//! [`SqlSecurity::quote_identifier`] or [`SqlSecurity::quote_qualified_name`]
//! before it is embedded, and caller-supplied filter predicates pass through
//! [`SqlSecurity::validate_filter_expression`].

use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;

/// SQL identifier validation and quoting utilities.
pub struct SqlSecurity;

const MAX_IDENTIFIER_LENGTH: usize = 128;
const MAX_EXPRESSION_LENGTH: usize = 2000;

impl SqlSecurity {
    /// Validates a single identifier segment and wraps it in double quotes.
    ///
    /// Quoting keeps the original case, which DataFusion needs for
    /// mixed-case column names.
    ///
    /// # Examples
    /// ```rust
    /// use term_partition::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("order_date").unwrap(), "\"order_date\"");
    /// assert!(SqlSecurity::quote_identifier("id; DROP TABLE orders").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        Ok(format!("\"{identifier}\""))
    }

    /// Quotes every segment of a dotted name (`sales.orders` becomes
    /// `"sales"."orders"`).
    pub fn quote_qualified_name(name: &str) -> Result<String> {
        let parts = name
            .split('.')
            .map(Self::quote_identifier)
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("."))
    }

    /// Validates one identifier segment without quoting it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(TermError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("Hard-coded regex pattern should be valid")
        });

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(TermError::SecurityError(format!(
                "Invalid SQL identifier '{identifier}': identifiers must start with a letter or underscore and contain only letters, digits, underscores and '$'"
            )));
        }

        Ok(())
    }

    /// Validates a caller-supplied predicate used to filter the query log
    /// (typically a time window such as `start_time >= '2024-01-01'`).
    pub fn validate_filter_expression(expression: &str) -> Result<()> {
        if expression.trim().is_empty() {
            return Err(TermError::SecurityError(
                "Filter expression cannot be empty".to_string(),
            ));
        }

        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(TermError::SecurityError(format!(
                "Filter expression too long (max {MAX_EXPRESSION_LENGTH} characters)"
            )));
        }

        if expression.contains('\0') {
            return Err(TermError::SecurityError(
                "Filter expression cannot contain null bytes".to_string(),
            ));
        }

        for marker in [";", "--", "/*", "*/"] {
            if expression.contains(marker) {
                return Err(TermError::SecurityError(format!(
                    "Filter expression contains forbidden sequence '{marker}'"
                )));
            }
        }

        // Whole words only, so columns such as `created_at` stay usable.
        static FORBIDDEN_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(
                r"(?i)\b(select|insert|update|delete|drop|create|alter|truncate|union|exec|execute|copy|grant|revoke)\b",
            )
            .expect("Hard-coded regex pattern should be valid")
        });

        if let Some(found) = FORBIDDEN_KEYWORDS.find(expression) {
            return Err(TermError::SecurityError(format!(
                "Filter expression contains forbidden keyword '{}'",
                found.as_str().to_lowercase()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(SqlSecurity::quote_identifier("customer_id").unwrap(), "\"customer_id\"");
        assert_eq!(SqlSecurity::quote_identifier("OrderDate").unwrap(), "\"OrderDate\"");
        assert_eq!(SqlSecurity::quote_identifier("created_at").unwrap(), "\"created_at\"");
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(SqlSecurity::validate_identifier("").is_err());
        assert!(SqlSecurity::validate_identifier("   ").is_err());
        assert!(SqlSecurity::validate_identifier("1column").is_err());
        assert!(SqlSecurity::validate_identifier("a\"b").is_err());
        assert!(SqlSecurity::validate_identifier("id; DROP TABLE x").is_err());
        assert!(SqlSecurity::validate_identifier(&"x".repeat(200)).is_err());
    }

    #[test]
    fn test_quote_qualified_name() {
        assert_eq!(
            SqlSecurity::quote_qualified_name("sales.orders").unwrap(),
            "\"sales\".\"orders\""
        );
        assert!(SqlSecurity::quote_qualified_name("sales..orders").is_err());
    }

    #[test]
    fn test_filter_expression_accepts_time_windows() {
        assert!(SqlSecurity::validate_filter_expression(
            "created_at >= '2024-01-01' AND created_at < '2024-02-01'"
        )
        .is_ok());
        assert!(SqlSecurity::validate_filter_expression("user_name = 'etl'").is_ok());
    }

    #[test]
    fn test_filter_expression_rejects_injection() {
        assert!(SqlSecurity::validate_filter_expression("1=1; DROP TABLE query_log").is_err());
        assert!(SqlSecurity::validate_filter_expression("1=1 -- comment").is_err());
        assert!(SqlSecurity::validate_filter_expression(
            "query_id IN (SELECT query_id FROM other)"
        )
        .is_err());
        assert!(SqlSecurity::validate_filter_expression("").is_err());
    }
}
