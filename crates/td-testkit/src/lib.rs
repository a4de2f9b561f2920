//! Shared integration-test harness for the task-dispatcher workspace.
//!
//! Mirrors the teacher's `mqk-testkit` role: a thin crate other crates'
//! `tests/` directories pull in, never linked into production binaries.

use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use wiremock::matchers::{method as method_matcher, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use td_config::DownstreamConfig;
use td_schemas::{HttpMethod, NewTask, Service};

pub use td_db::testkit_db_pool;

/// Insert a PENDING task with the given shape and return its `task_id`.
/// Thin wrapper over `td_db::insert_task` so scenario tests don't need to
/// construct a `NewTask` by hand.
pub async fn seed_pending_task(
    pool: &PgPool,
    service: Service,
    route: &str,
    method: HttpMethod,
    params: Value,
) -> Result<Uuid> {
    let task_id = td_db::insert_task(
        pool,
        NewTask {
            service,
            route: route.to_string(),
            method,
            params,
        },
    )
    .await?;
    Ok(task_id)
}

/// An in-process mock downstream HTTP server, standing in for USER/PAYMENT/
/// FLIGHT in dispatcher and worker scenario tests. All three services point
/// at the same `wiremock::MockServer` unless the caller mounts routes that
/// distinguish by path.
pub struct MockDownstream {
    pub server: MockServer,
}

impl MockDownstream {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// A `DownstreamConfig` with every service base URL pointed at this
    /// mock server.
    pub fn downstream_config(&self) -> DownstreamConfig {
        let base = url::Url::parse(&self.server.uri()).expect("wiremock uri is a valid url");
        DownstreamConfig {
            user: base.clone(),
            payment: base.clone(),
            flight: base,
        }
    }

    /// Mount a 2xx JSON response for `method`/`route`.
    pub async fn mount_json_success(&self, http_method: &str, route: &str, body: Value) {
        Mock::given(method_matcher(http_method))
            .and(path(format!("/{route}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount a non-2xx JSON response for `method`/`route`.
    pub async fn mount_json_failure(
        &self,
        http_method: &str,
        route: &str,
        status: u16,
        body: Value,
    ) {
        Mock::given(method_matcher(http_method))
            .and(path(format!("/{route}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_downstream_serves_mounted_routes() {
        let mock = MockDownstream::start().await;
        mock.mount_json_success("POST", "create-user", serde_json::json!({"id": "u1"}))
            .await;

        let config = mock.downstream_config();
        let client = reqwest::Client::new();
        let resp = client
            .post(config.user.join("create-user").unwrap())
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, serde_json::json!({"id": "u1"}));
    }
}
