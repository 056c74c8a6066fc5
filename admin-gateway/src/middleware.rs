//! Connection precondition for table-scoped routes.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use common::errors::AppError;

use crate::state::AppState;

/// Rejects the request with `NoActiveConnection` unless a connection is
/// active, and otherwise pins that connection in the request extensions for
/// the handler.
pub async fn require_connection(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let connection = state
        .registry
        .current()
        .await
        .ok_or(AppError::NoActiveConnection)?;
    req.extensions_mut().insert(connection);
    Ok(next.run(req).await)
}
