//! Response bodies.
//!
//! Every endpoint answers with one of these shapes; failures always use
//! [`ErrorBody`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::row::Row;

/// Error payload returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Short, human-readable summary.
    pub error: String,
    /// Error code for client handling (e.g. "VALIDATION_ERROR").
    pub code: String,
    /// Text of the underlying error.
    pub details: String,
}

/// Liveness message for `GET /`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
    /// Engine of the active connection, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

/// Result of a successful connect.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectResponse {
    pub status: String,
    /// Tables or collections discovered on the new connection.
    pub tables: Vec<String>,
}

impl ConnectResponse {
    pub fn connected(tables: Vec<String>) -> Self {
        Self {
            status: "connected".to_string(),
            tables,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ColumnsResponse {
    pub columns: Vec<String>,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    pub success: bool,
    /// Generated identifier, when the engine reports one.
    #[schema(value_type = Object)]
    pub inserted_id: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_count: u64,
}

/// One page of table data plus the filtered total.
#[derive(Debug, Serialize, ToSchema)]
pub struct TableDataResponse {
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Row>,
    pub total: u64,
}
