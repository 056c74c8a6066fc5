//! Raw query models.
//!
//! Contains models for running a native statement on the active engine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::row::Row;

/// Request body for executing a raw query.
///
/// Relational engines take a SQL statement; MongoDB takes a JSON document of
/// the form `{"collection": "...", "filter": {...}}`.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct QueryRequest {
    /// Statement to execute.
    #[validate(length(min = 1, message = "query is required"))]
    pub query: String,

    /// Maximum number of rows to return (default: 1000).
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, message = "limit must be positive"))]
    pub limit: usize,
}

fn default_limit() -> usize {
    1000
}

/// Result of a raw query execution.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Returned rows (empty for statements that only modify data).
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Row>,

    /// Number of rows returned.
    pub row_count: usize,

    /// Number of rows affected (for INSERT/UPDATE/DELETE).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,

    /// Query execution time in milliseconds.
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Creates a result carrying rows.
    pub fn rows(rows: Vec<Row>, execution_time_ms: u64) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            affected_rows: None,
            execution_time_ms,
        }
    }

    /// Creates a query result with affected rows count (for non-SELECT queries).
    pub fn affected(affected: u64, execution_time_ms: u64) -> Self {
        Self {
            rows: vec![],
            row_count: 0,
            affected_rows: Some(affected),
            execution_time_ms,
        }
    }
}
