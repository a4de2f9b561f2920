//! Worker pool lifecycle: spawn `WORKER_COUNT` workers at process start,
//! cancel and await them at shutdown.
//!
//! Grounded on the teacher's `spawn_heartbeat` (`tokio::spawn(async move {
//! loop { ... } })`, one task per call) generalized to a pool with a shared
//! cancellation token and collected `JoinHandle`s, per spec.md §4.5.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use td_config::DownstreamConfig;

use crate::run_worker;

/// Handle to a running pool of workers. Dropping this without calling
/// `shutdown` leaves the workers running detached; callers should always
/// shut down explicitly so the supervisor can await clean termination.
pub struct WorkerPool {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers, each a `tokio::spawn`'d `run_worker` loop
    /// sharing one `PgPool` and one `reqwest::Client`.
    pub fn spawn(
        count: usize,
        pool: PgPool,
        http: reqwest::Client,
        downstream: Arc<DownstreamConfig>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(count);

        for i in 0..count {
            let pool = pool.clone();
            let http = http.clone();
            let downstream = Arc::clone(&downstream);
            let cancel = cancel.clone();
            let worker_id = format!("worker-{i}");

            handles.push(tokio::spawn(run_worker(
                pool, http, downstream, worker_id, cancel,
            )));
        }

        Self { cancel, handles }
    }

    /// Broadcast cancellation to every worker and await their termination.
    /// Individual worker panics are logged, not propagated — a crashed
    /// worker's replacement is supervisor policy out of this crate's scope
    /// (spec.md §4.4).
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let results = futures_util::future::join_all(self.handles).await;
        for result in results {
            if let Err(e) = result {
                tracing::error!(error = %e, "worker task panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_awaits_all_spawned_workers() {
        // No live Postgres/downstream needed: workers idle on the empty-
        // queue backoff and a disconnected pool just errors on claim, which
        // the loop logs and retries — shutdown still completes promptly
        // because cancellation is checked before every retry.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy("postgres://invalid-host-for-testkit/invalid")
            .expect("lazy connect never touches the network");
        let http = reqwest::Client::new();
        let downstream = Arc::new(DownstreamConfig {
            user: url::Url::parse("http://127.0.0.1:1").unwrap(),
            payment: url::Url::parse("http://127.0.0.1:1").unwrap(),
            flight: url::Url::parse("http://127.0.0.1:1").unwrap(),
        });

        let pool_handle = WorkerPool::spawn(3, pool, http, downstream);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        pool_handle.shutdown().await;
    }
}
