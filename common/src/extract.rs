//! Request extractors.

use axum::extract::{FromRequest, Request};
use axum::Json;

use crate::errors::AppError;

/// JSON body extractor whose rejections are [`AppError::Validation`], so a
/// malformed body gets the same `{error, code, details}` response as any
/// other caller fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}
