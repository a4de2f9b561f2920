//! Request and response types for all td-daemon HTTP endpoints.
//!
//! `Serialize + Deserialize` so Axum can JSON-encode/decode them and tests
//! can build bodies directly. No business logic lives here.

use serde::Serialize;

/// `GET /health` response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

/// Body returned on every error response: `{"detail": "<message>"}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}
