//! Identifier normalisation shared by the extractor, the catalog and the advisor.

/// Lower-cases an identifier and strips one level of SQL quoting.
pub fn normalize_identifier(ident: &str) -> String {
    let trimmed = ident.trim();
    let unquoted = match (trimmed.chars().next(), trimmed.chars().last()) {
        (Some('"'), Some('"')) | (Some('`'), Some('`')) if trimmed.len() >= 2 => {
            &trimmed[1..trimmed.len() - 1]
        }
        (Some('['), Some(']')) if trimmed.len() >= 2 => &trimmed[1..trimmed.len() - 1],
        _ => trimmed,
    };
    unquoted.to_lowercase()
}

/// Normalises every segment of a dotted name such as `Sales."Orders"`.
pub fn normalize_qualified(name: &str) -> String {
    name.split('.')
        .map(normalize_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Returns true when two (normalised) table names refer to the same table.
///
/// Names match when the segments of the shorter one are a suffix of the
/// longer one, so `orders`, `sales.orders` and `lake.sales.orders` all match.
pub fn table_matches(a: &str, b: &str) -> bool {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();
    let (short, long) = if a_parts.len() <= b_parts.len() {
        (a_parts, b_parts)
    } else {
        (b_parts, a_parts)
    };
    long.ends_with(&short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("Order_Date"), "order_date");
        assert_eq!(normalize_identifier("\"Status\""), "status");
        assert_eq!(normalize_identifier("`id`"), "id");
        assert_eq!(normalize_identifier("[Amount]"), "amount");
        assert_eq!(normalize_identifier("\""), "\"");
    }

    #[test]
    fn test_normalize_qualified() {
        assert_eq!(normalize_qualified("Sales.\"Orders\""), "sales.orders");
    }

    #[test]
    fn test_table_matches() {
        assert!(table_matches("orders", "orders"));
        assert!(table_matches("orders", "sales.orders"));
        assert!(table_matches("lake.sales.orders", "sales.orders"));
        assert!(!table_matches("orders", "sales.customers"));
        assert!(!table_matches("archive.orders", "sales.orders"));
        assert!(!table_matches("orders", "preorders"));
    }
}
