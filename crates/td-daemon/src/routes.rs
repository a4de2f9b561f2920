//! Axum router and all HTTP handlers for td-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware (CORS, tracing). Handlers are `pub(crate)` so scenario tests
//! in `tests/` can compose the bare router directly, per the teacher's
//! `mqk-daemon::routes` convention.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use td_schemas::{CreateTaskRequest, HttpMethod, NewTask, TaskStatusResponse};

use crate::api_types::HealthResponse;
use crate::error::{ApiError, ValidatedJson};
use crate::state::AppState;

/// Build the complete application router wired to the given shared state.
/// Middleware is **not** applied here; `main.rs` attaches it after this call
/// so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/create-task", post(create_task))
        .route("/tasks/:task_id", get(get_task))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::default()))
}

// ---------------------------------------------------------------------------
// POST /create-task
// ---------------------------------------------------------------------------

pub(crate) async fn create_task(
    State(st): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.route.trim().is_empty() {
        return Err(ApiError::Validation("route must be non-empty".to_string()));
    }
    if !body.params.is_object() {
        return Err(ApiError::Validation("params must be a JSON object".to_string()));
    }

    let draft = NewTask {
        service: body.service,
        route: body.route,
        method: body.method.unwrap_or(HttpMethod::Post),
        params: body.params,
    };

    let task_id = td_db::insert_task(&st.pool, draft).await?;
    Ok((StatusCode::OK, Json(task_id)))
}

// ---------------------------------------------------------------------------
// GET /tasks/:task_id
// ---------------------------------------------------------------------------

pub(crate) async fn get_task(
    State(st): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id: Uuid = task_id.parse().map_err(|_| ApiError::NotFound)?;

    let record = td_db::lookup_by_task_id(&st.pool, task_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok((StatusCode::OK, Json(TaskStatusResponse::from(record))))
}
