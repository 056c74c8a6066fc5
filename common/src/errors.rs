//! Error taxonomy shared by every layer.
//!
//! Caller faults map to 400, everything else to 500. The response body always
//! carries the underlying error text in `details`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ErrorBody;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Engine tag not recognized.
    #[error("unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    /// Identifier could not be converted to the engine's native id type.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A table-scoped operation was issued before any connect.
    #[error("No active connection. Please connect first.")]
    NoActiveConnection,

    /// Request parameters failed validation.
    #[error("{0}")]
    Validation(String),

    /// Filter referenced a column the sampled row does not have.
    #[error("Column \"{column}\" does not exist in table \"{table}\"")]
    UnknownColumn { column: String, table: String },

    /// Raw statement rejected by the SQL validator.
    #[error("unsafe SQL: {0}")]
    UnsafeSql(String),

    /// Opening a backend connection failed.
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    /// The backend rejected or failed an operation.
    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    /// A mutation matched nothing.
    #[error("{0}")]
    NoRowsAffected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedDatabaseType(_)
            | AppError::InvalidIdentifier(_)
            | AppError::NoActiveConnection
            | AppError::Validation(_)
            | AppError::UnknownColumn { .. }
            | AppError::UnsafeSql(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseConnection(_)
            | AppError::DatabaseQuery(_)
            | AppError::NoRowsAffected(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UnsupportedDatabaseType(_) => "UNSUPPORTED_DATABASE",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::NoActiveConnection => "NO_ACTIVE_CONNECTION",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            AppError::UnsafeSql(_) => "UNSAFE_SQL",
            AppError::DatabaseConnection(_) => "DATABASE_CONNECTION_ERROR",
            AppError::DatabaseQuery(_) => "DATABASE_QUERY_ERROR",
            AppError::NoRowsAffected(_) => "NO_ROWS_AFFECTED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short summary shown in the `error` field.
    fn summary(&self) -> &'static str {
        match self {
            AppError::UnsupportedDatabaseType(_) => "Unsupported database type",
            AppError::InvalidIdentifier(_) => "Invalid identifier",
            AppError::NoActiveConnection => "No active connection. Please connect first.",
            AppError::Validation(_) | AppError::UnknownColumn { .. } => "Invalid request",
            AppError::UnsafeSql(_) => "Statement rejected",
            AppError::DatabaseConnection(_) => "Failed to connect to database",
            AppError::DatabaseQuery(_) | AppError::NoRowsAffected(_) => "Database operation failed",
            AppError::Internal(_) => "Internal server error",
        }
    }

    /// Whether the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = self.code(), details = %details, "request failed");
        } else {
            tracing::warn!(code = self.code(), details = %details, "request rejected");
        }

        let body = ErrorBody {
            error: self.summary().to_string(),
            code: self.code().to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::DatabaseQuery(e.to_string())
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        AppError::DatabaseQuery(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = e
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |err| match &err.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        AppError::Validation(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_faults_are_bad_request() {
        assert_eq!(AppError::NoActiveConnection.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::UnsupportedDatabaseType("oracle".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert!(AppError::InvalidIdentifier("xyz".into()).is_client_error());
    }

    #[test]
    fn test_upstream_failures_are_server_errors() {
        assert_eq!(
            AppError::DatabaseQuery("syntax error".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!AppError::DatabaseConnection("refused".into()).is_client_error());
    }

    #[test]
    fn test_unknown_column_message_names_the_column() {
        let err = AppError::UnknownColumn {
            column: "nonexistent".into(),
            table: "users".into(),
        };
        assert_eq!(err.code(), "UNKNOWN_COLUMN");
        assert!(err.to_string().contains("\"nonexistent\""));
    }
}
