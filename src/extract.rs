//! Request extractors whose rejections use the JSON error payload.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `axum::Json`, but a missing content type or an unreadable body becomes a
/// validation error on `body`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::from(rejection)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Request body must be sent as application/json".to_string()
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
            JsonRejection::JsonDataError(_) => {
                format!("Request body has the wrong shape: {}", rejection.body_text())
            }
            _ => rejection.body_text(),
        };
        tracing::debug!(status = %rejection.status(), "Rejected request body: {}", rejection.body_text());
        AppError::field("body", &message)
    }
}

/// The `{id}` segment of a donation route. Anything that is not an integer
/// cannot name a donation, so it reads as not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationId(pub i64);

impl<S> FromRequestParts<S> for DonationId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::donation_not_found())?;
        raw.trim()
            .parse()
            .map(DonationId)
            .map_err(|_| AppError::donation_not_found())
    }
}
