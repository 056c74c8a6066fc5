//! SQL statement validator.
//!
//! Guards the raw query endpoint against destructive statements.

use crate::errors::AppError;

/// Validates raw SQL statements.
pub struct SqlValidator;

/// Forbidden statement prefixes/fragments, matched on normalized upper-case text.
const FORBIDDEN_KEYWORDS: [&str; 5] = ["DROP ", "TRUNCATE ", "DELETE FROM", "ALTER ", "GRANT "];

/// Statement heads that produce a result set.
const ROW_RETURNING: [&str; 6] = ["SELECT", "WITH", "SHOW", "EXPLAIN", "DESCRIBE", "VALUES"];

impl SqlValidator {
    /// Validates a SQL statement for forbidden operations.
    ///
    /// # Errors
    /// Returns `AppError::UnsafeSql` if the SQL contains a forbidden keyword,
    /// and `AppError::Validation` if it is empty.
    pub fn validate(sql: &str) -> Result<(), AppError> {
        let normalized = normalize(sql);
        if normalized.trim().is_empty() {
            return Err(AppError::Validation("query is required".into()));
        }
        for keyword in FORBIDDEN_KEYWORDS {
            if normalized.contains(keyword) {
                return Err(AppError::UnsafeSql(format!(
                    "forbidden operation: {}",
                    keyword.trim()
                )));
            }
        }
        Ok(())
    }

    /// Checks if the statement returns rows.
    pub fn returns_rows(sql: &str) -> bool {
        let normalized = normalize(sql);
        ROW_RETURNING
            .iter()
            .any(|head| normalized.starts_with(head))
    }
}

/// Upper-cases and collapses whitespace so `DROP\tTABLE` cannot slip through.
fn normalize(sql: &str) -> String {
    let mut out = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    out.make_ascii_uppercase();
    out.push(' ');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_allowed() {
        assert!(SqlValidator::validate("SELECT * FROM users").is_ok());
    }

    #[test]
    fn test_drop_is_forbidden() {
        assert!(SqlValidator::validate("DROP TABLE users").is_err());
        assert!(SqlValidator::validate("drop\ttable users").is_err());
        assert!(SqlValidator::validate("truncate users").is_err());
    }

    #[test]
    fn test_empty_statement_is_a_validation_error() {
        assert!(matches!(
            SqlValidator::validate("   "),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_row_returning_detection() {
        assert!(SqlValidator::returns_rows("  select * FROM users"));
        assert!(SqlValidator::returns_rows("WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(!SqlValidator::returns_rows("INSERT INTO users VALUES (1)"));
    }
}
