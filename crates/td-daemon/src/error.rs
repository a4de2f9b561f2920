//! Error taxonomy for the API surface (spec.md §7 items 1-2) and the
//! `IntoResponse` mapping that turns typed errors from `td-db` into the
//! wire-level `{"detail": ...}` body.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
use serde::de::DeserializeOwned;

use crate::api_types::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request body: bad JSON, unknown enum token, missing field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unique-constraint violation at insert.
    #[error("conflict")]
    Conflict,

    /// `GET /tasks/{task_id}` found no matching row.
    #[error("task not found")]
    NotFound,

    /// Anything else (DB unavailable, etc.) — surfaced as 500, logged with
    /// full detail server-side but not leaked to the client.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<td_db::StoreError> for ApiError {
    fn from(e: td_db::StoreError) -> Self {
        match e {
            td_db::StoreError::Conflict => ApiError::Conflict,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::Conflict => (StatusCode::CONFLICT, "task conflict".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Task not found".to_string()),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// `Json<T>` that maps deserialization/content-type failures onto
/// `ApiError::Validation` instead of axum's default plain-text rejection
/// body, so every error response on the wire stays JSON per spec.md §6.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) => Err(ApiError::Validation(describe_rejection(rejection))),
        }
    }
}

fn describe_rejection(rejection: JsonRejection) -> String {
    rejection.to_string()
}
