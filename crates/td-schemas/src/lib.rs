//! Wire and DB-shape types shared across the task-dispatcher crates.
//!
//! Plain serde structs/enums; no business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One of the fixed downstream services a task can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    User,
    Payment,
    Flight,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::User => "user",
            Service::Payment => "payment",
            Service::Flight => "flight",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Service::User),
            "payment" => Some(Service::Payment),
            "flight" => Some(Service::Flight),
            _ => None,
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a task. Transitions form a DAG:
/// Pending -> Processing -> {Success, Failed}. Never backward or sideways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "processing" => Some(TaskStatus::Processing),
            "success" => Some(TaskStatus::Success),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// HTTP verb a task is dispatched with. Defaults to `Post` when absent on
/// creation (see `NewTaskRequest::method`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    /// Non-GET-family verbs send `params` as a JSON body; GET/HEAD/OPTIONS
    /// send it as query parameters.
    pub fn sends_json_body(&self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Delete | HttpMethod::Patch
        )
    }
}

/// A fully-persisted task row, as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub task_id: Uuid,
    pub service: Service,
    pub route: String,
    pub method: HttpMethod,
    pub params: Value,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields needed to insert a new task. `status` is always `Pending`;
/// `id`/`task_id`/timestamps are generated by the store.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub service: Service,
    pub route: String,
    pub method: HttpMethod,
    pub params: Value,
}

/// A claimed row: the detached snapshot `claim_one_pending` hands the
/// worker. Carries no status/result/timestamp fields — those are owned by
/// the store once the row is back in PROCESSING.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub service: Service,
    pub route: String,
    pub method: HttpMethod,
    pub params: Value,
}

/// `POST /create-task` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub service: Service,
    pub route: String,
    #[serde(default)]
    pub method: Option<HttpMethod>,
    /// Must be a JSON object (spec.md §3: "structured JSON value (mapping)");
    /// enforced by `td-daemon::routes::create_task`, not by this type, since
    /// a custom `Deserialize` would lose serde's derived field-level errors.
    pub params: Value,
}

/// `GET /tasks/{task_id}` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<Value>,
}

impl From<TaskRecord> for TaskStatusResponse {
    fn from(t: TaskRecord) -> Self {
        Self {
            task_id: t.task_id,
            status: t.status,
            result: t.result,
        }
    }
}
