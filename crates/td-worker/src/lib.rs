//! Worker: the long-running claim -> dispatch -> finalize loop.
//!
//! Each worker is a single Tokio task. A pool of `WORKER_COUNT` of these
//! share one `PgPool` and one `reqwest::Client`; `supervisor::WorkerPool`
//! spawns them and drives their shutdown, called from `td-daemon::main`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use td_config::DownstreamConfig;
use td_schemas::TaskStatus;

mod supervisor;
pub use supervisor::WorkerPool;

/// Sleep duration between claim attempts when the queue is empty.
pub const CLAIM_BACKOFF: Duration = Duration::from_millis(300);

/// Run a single worker's claim -> dispatch -> finalize loop until
/// cancelled. Returns once `cancel` is triggered and the current
/// suspension point is reached — mid-dispatch cancellation leaves the
/// claimed row in PROCESSING (no compensating finalize; see spec.md §5/§7).
pub async fn run_worker(
    pool: PgPool,
    http: reqwest::Client,
    downstream: Arc<DownstreamConfig>,
    worker_id: String,
    cancel: CancellationToken,
) {
    loop {
        let claimed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(worker_id = %worker_id, "cancelled at idle suspension point");
                return;
            }
            res = td_db::claim_one_pending(&pool) => res,
        };

        let task = match claimed {
            Ok(Some(task)) => task,
            Ok(None) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!(worker_id = %worker_id, "cancelled during empty-queue backoff");
                        return;
                    }
                    _ = tokio::time::sleep(CLAIM_BACKOFF) => continue,
                }
            }
            Err(e) => {
                // Transient DB error: log and retry after the same backoff
                // rather than tearing down the worker task (spec.md §7 item 6).
                tracing::error!(worker_id = %worker_id, error = %e, "claim failed; retrying after backoff");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(CLAIM_BACKOFF) => continue,
                }
            }
        };

        let dispatch_result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(
                    worker_id = %worker_id,
                    task_id = %task.task_id,
                    "cancelled mid-dispatch; task remains PROCESSING"
                );
                return;
            }
            res = td_dispatch::dispatch(&http, &downstream, &task) => res,
        };

        let (status, result) = outcome_to_finalize(dispatch_result);

        if let Err(e) = td_db::finalize_task(&pool, task.id, status, result).await {
            tracing::error!(
                worker_id = %worker_id,
                task_id = %task.task_id,
                error = %e,
                "finalize failed; continuing after backoff"
            );
        }
    }
}

/// Map a dispatch outcome onto the terminal status + result payload per
/// spec.md §4.4 steps 4-6:
/// - success -> SUCCESS with the normalized payload.
/// - non-2xx downstream status -> FAILED with the parsed body, or a
///   `{"detail": ...}` wrapper if the body doesn't parse as JSON.
/// - any other error (transport, url) -> FAILED with `{"detail": ...}`.
fn outcome_to_finalize(result: Result<Value, td_dispatch::DispatchError>) -> (TaskStatus, Value) {
    match result {
        Ok(payload) => (TaskStatus::Success, payload),
        Err(td_dispatch::DispatchError::HttpStatus { body, .. }) => {
            let detail = serde_json::from_slice::<Value>(&body)
                .unwrap_or_else(|_| json!({"detail": String::from_utf8_lossy(&body).into_owned()}));
            (TaskStatus::Failed, detail)
        }
        Err(other) => (TaskStatus::Failed, json!({"detail": other.to_string()})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use td_dispatch::DispatchError;

    #[test]
    fn success_outcome_carries_payload_through_unchanged() {
        let (status, result) = outcome_to_finalize(Ok(json!({"ok": true})));
        assert_eq!(status, TaskStatus::Success);
        assert_eq!(result, json!({"ok": true}));
    }

    #[test]
    fn http_status_error_with_json_body_is_parsed_into_result() {
        let err = DispatchError::HttpStatus {
            status: 422,
            body: br#"{"error": "bad input"}"#.to_vec(),
        };
        let (status, result) = outcome_to_finalize(Err(err));
        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(result, json!({"error": "bad input"}));
    }

    #[test]
    fn http_status_error_with_non_json_body_falls_back_to_detail_wrapper() {
        let err = DispatchError::HttpStatus {
            status: 500,
            body: b"internal server error".to_vec(),
        };
        let (status, result) = outcome_to_finalize(Err(err));
        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(result, json!({"detail": "internal server error"}));
    }

    #[test]
    fn transport_error_wraps_message_as_detail() {
        let err = DispatchError::UrlJoin(url::Url::parse("not a url").unwrap_err());
        let (status, result) = outcome_to_finalize(Err(err));
        assert_eq!(status, TaskStatus::Failed);
        assert!(result.get("detail").is_some());
    }
}
