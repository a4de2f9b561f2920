//! Shared runtime state for td-daemon.
//!
//! Handlers receive `State<Arc<AppState>>`, matching the teacher's
//! `mqk-daemon::state::AppState` convention. Dispatch itself never happens
//! on the request path (spec.md §4.6 handlers only touch the store), so
//! this holds just the DB pool — the HTTP client and downstream config live
//! with the worker pool in `main.rs`.
pub struct AppState {
    pub pool: sqlx::PgPool,
}

impl AppState {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}
