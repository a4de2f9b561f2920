//! Task Store + Queue Protocol.
//!
//! Owns the `tasks` table: schema migration, insert, the claim/finalize
//! transactions that make the table a crash-safe work queue, and the
//! task_id lookup used by the polling endpoint.
//!
//! No reaper for rows stuck in PROCESSING after a worker crash is provided
//! here — that gap is an accepted, explicit design decision (see
//! DESIGN.md's Open Question ledger), not an oversight. An external sweeper
//! can be built entirely out of `claim_one_pending`/`finalize_task`'s
//! sibling primitives; this crate does not add one unasked.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use td_schemas::{ClaimedTask, HttpMethod, NewTask, Service, TaskRecord, TaskStatus};

pub const ENV_DB_URL: &str = "DATABASE_URL";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique-constraint violation at insert (duplicate `task_id`/`id`).
    /// The API layer maps this to 409, not 500.
    #[error("task conflict: unique constraint violated")]
    Conflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to Postgres using `DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool, StoreError> {
    let url = std::env::var(ENV_DB_URL)
        .map_err(|_| sqlx::Error::Configuration(format!("missing env var {ENV_DB_URL}").into()))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(())
}

/// Test helper: connect using `DATABASE_URL` and ensure migrations are applied.
pub async fn testkit_db_pool() -> Result<PgPool, StoreError> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Insert a new task row with status=PENDING. Generates a fresh `id` and
/// `task_id`; timestamps are set to `now()`.
///
/// Returns `StoreError::Conflict` if a unique-constraint violation occurs
/// (practically unreachable for freshly generated UUIDs, but the caller —
/// the API layer — must still be able to answer 409 per spec.md §4.1).
pub async fn insert_task(pool: &PgPool, draft: NewTask) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    let task_id = Uuid::new_v4();
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        insert into tasks (id, task_id, service, status, route, method, params, created_at, updated_at)
        values ($1, $2, $3, 'pending', $4, $5, $6, $7, $7)
        "#,
    )
    .bind(id)
    .bind(task_id)
    .bind(draft.service.as_str())
    .bind(&draft.route)
    .bind(draft.method.as_str())
    .bind(&draft.params)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(task_id),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(StoreError::Conflict)
        }
        Err(e) => Err(StoreError::Database(e)),
    }
}

/// Atomically claim exactly one PENDING task for exclusive dispatch.
///
/// Single transaction:
///   1. `SELECT ... WHERE status = 'pending' ORDER BY created_at ASC LIMIT 1
///      FOR UPDATE SKIP LOCKED` — acquires the row lock without blocking on
///      rows another worker already holds.
///   2. `UPDATE ... SET status = 'processing'` on that row, same transaction.
///   3. Commit.
///
/// Returns `None` if no PENDING row is available. The `status = 'pending'`
/// predicate is always present — omitting it would re-claim rows already in
/// PROCESSING, which is a known historical bug this implementation does not
/// reproduce.
pub async fn claim_one_pending(pool: &PgPool) -> Result<Option<ClaimedTask>, StoreError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        select id, task_id, service, route, method, params
          from tasks
         where status = 'pending'
         order by created_at asc
         limit 1
           for update skip locked
        "#,
    )
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.commit().await?;
        return Ok(None);
    };

    let id: Uuid = row.try_get("id")?;

    sqlx::query("update tasks set status = 'processing', updated_at = now() where id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let service_raw: String = row.try_get("service")?;
    let method_raw: String = row.try_get("method")?;

    Ok(Some(ClaimedTask {
        id,
        task_id: row.try_get("task_id")?,
        service: Service::parse(&service_raw)
            .ok_or_else(|| StoreError::Database(sqlx::Error::Decode(
                format!("unknown service token: {service_raw}").into(),
            )))?,
        route: row.try_get("route")?,
        method: HttpMethod::parse(&method_raw)
            .ok_or_else(|| StoreError::Database(sqlx::Error::Decode(
                format!("unknown method token: {method_raw}").into(),
            )))?,
        params: row.try_get("params")?,
    }))
}

/// Transition a claimed row to a terminal state (SUCCESS or FAILED),
/// recording `result` and refreshing `updated_at`.
///
/// No lock is re-acquired here; correctness relies on the contract that
/// only the worker holding the claim calls this, and calls it at most once.
/// Returns `true` iff a row matched `id`.
pub async fn finalize_task(
    pool: &PgPool,
    id: Uuid,
    status: TaskStatus,
    result: Value,
) -> Result<bool, StoreError> {
    let outcome = sqlx::query(
        r#"
        update tasks
           set status = $2,
               result = $3,
               updated_at = now()
         where id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(result)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

/// Read-only fetch by the public, indexed `task_id` column.
pub async fn lookup_by_task_id(pool: &PgPool, task_id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
    let row = sqlx::query(
        r#"
        select id, task_id, service, route, method, params, status, result, created_at, updated_at
          from tasks
         where task_id = $1
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else { return Ok(None) };

    row_to_task_record(&row).map(Some)
}

fn row_to_task_record(row: &sqlx::postgres::PgRow) -> Result<TaskRecord, StoreError> {
    let service_raw: String = row.try_get("service")?;
    let method_raw: String = row.try_get("method")?;
    let status_raw: String = row.try_get("status")?;

    Ok(TaskRecord {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        service: Service::parse(&service_raw)
            .ok_or_else(|| StoreError::Database(sqlx::Error::Decode(
                format!("unknown service token: {service_raw}").into(),
            )))?,
        route: row.try_get("route")?,
        method: HttpMethod::parse(&method_raw)
            .ok_or_else(|| StoreError::Database(sqlx::Error::Decode(
                format!("unknown method token: {method_raw}").into(),
            )))?,
        params: row.try_get("params")?,
        status: TaskStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::Database(sqlx::Error::Decode(
                format!("unknown status token: {status_raw}").into(),
            )))?,
        result: row.try_get("result")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
