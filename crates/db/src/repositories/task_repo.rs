//! Repository for the `tasks` table: CRUD, the state-machine guardrails, and
//! the admission-controlled claim engine.
//!
//! Every status literal goes through `TaskStatus` from `models::status`.

use sqlx::{PgConnection, PgPool};
use vireo_core::admission::{
    ClaimMode, TaskSnapshot, MAX_IN_PROGRESS_PER_USER, RETRY_CEILING,
};
use vireo_core::types::DbId;

use crate::models::status::{TaskStatus, WorkerStatus};
use crate::models::task::{ClaimedTask, CreateTask, SnapshotRow, Task};

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    id, task_type, params, status_id, dependant_on, project_id, worker_id, \
    attempts, generation_created, result, error_message, \
    created_at, generation_started_at, generation_processed_at, updated_at";

/// Dependency gate shared by the claim and snapshot queries: the referenced
/// task, if any, must be Complete. `complete_bind` is the 1-based bind index
/// of the Complete status ID in the enclosing query.
fn dependency_satisfied(complete_bind: u32) -> String {
    format!(
        "(t.dependant_on IS NULL OR EXISTS ( \
            SELECT 1 FROM tasks d WHERE d.id = t.dependant_on \
            AND d.status_id = ${complete_bind}))"
    )
}

/// Provides CRUD and claim operations for generation tasks.
pub struct TaskRepo;

impl TaskRepo {
    // ── Insert / read ────────────────────────────────────────────────────

    /// Create a new queued task.
    ///
    /// A `dependant_on` reference to a nonexistent task is rejected by the
    /// foreign key; the API layer classifies that violation as a validation
    /// error.
    pub async fn insert(pool: &PgPool, input: &CreateTask) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (task_type, params, status_id, dependant_on, project_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(&input.task_type)
            .bind(&input.params)
            .bind(TaskStatus::Queued.id())
            .bind(input.dependant_on)
            .bind(input.project_id)
            .fetch_one(pool)
            .await
    }

    /// Find a task by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's tasks, newest first.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks WHERE project_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Resolve the user owning a task (through its project).
    pub async fn owner_of(pool: &PgPool, task_id: DbId) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT p.user_id FROM tasks t JOIN projects p ON p.id = t.project_id \
             WHERE t.id = $1",
        )
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }

    // ── Claim engine ─────────────────────────────────────────────────────

    /// Atomically claim the oldest eligible queued task for a worker.
    ///
    /// Eligibility: status Queued; dependency (if any) Complete; owning user
    /// has `credits > 0`, permits the claim mode's execution style, and has
    /// fewer than [`MAX_IN_PROGRESS_PER_USER`] tasks in progress. The
    /// claiming worker must not be Terminating or Terminated; a draining
    /// worker keeps its in-flight work but gets nothing new. FIFO by
    /// creation time within the eligible set only; an ineligible older task
    /// never blocks a younger eligible one.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` plus a conditional outer UPDATE
    /// keyed on the expected Queued status, so concurrent claims can never
    /// both win the same row: racing selectors skip the locked candidate and
    /// move to the next eligible task, or report "none available".
    pub async fn claim_next(
        pool: &PgPool,
        worker_id: DbId,
        mode: ClaimMode,
    ) -> Result<Option<ClaimedTask>, sqlx::Error> {
        let mode_clause = match mode {
            ClaimMode::Pool => "u.allow_pool_workers = true",
            ClaimMode::User(_) => "u.id = $8 AND u.allow_local_workers = true",
        };
        let dependency_gate = dependency_satisfied(4);

        let query = format!(
            "UPDATE tasks \
             SET status_id = $2, worker_id = $1, \
                 generation_started_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT t.id FROM tasks t \
                 JOIN projects p ON p.id = t.project_id \
                 JOIN users u ON u.id = p.user_id \
                 WHERE t.status_id = $3 \
                   AND {dependency_gate} \
                   AND u.credits > 0 \
                   AND {mode_clause} \
                   AND (SELECT COUNT(*) FROM tasks r \
                            JOIN projects rp ON rp.id = r.project_id \
                        WHERE rp.user_id = u.id AND r.status_id = $2) < $5 \
                   AND (SELECT w.status_id FROM workers w WHERE w.id = $1) \
                       NOT IN ($6, $7) \
                 ORDER BY t.created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE OF t SKIP LOCKED \
             ) \
             AND status_id = $3 \
             RETURNING id AS task_id, task_type, params, project_id, \
                 (SELECT p.user_id FROM projects p WHERE p.id = project_id) AS user_id"
        );

        let mut q = sqlx::query_as::<_, ClaimedTask>(&query)
            .bind(worker_id)
            .bind(TaskStatus::InProgress.id())
            .bind(TaskStatus::Queued.id())
            .bind(TaskStatus::Complete.id())
            .bind(MAX_IN_PROGRESS_PER_USER)
            .bind(WorkerStatus::Terminating.id())
            .bind(WorkerStatus::Terminated.id());

        if let ClaimMode::User(user_id) = mode {
            q = q.bind(user_id);
        }

        q.fetch_optional(pool).await
    }

    /// Read-only per-queued-task eligibility snapshots for the counting mode.
    ///
    /// Evaluated with the same predicates as [`Self::claim_next`] but never
    /// mutates state; the aggregation into a diagnostics report happens in
    /// `vireo_core::admission::summarize`.
    pub async fn queue_snapshots(
        pool: &PgPool,
        mode: ClaimMode,
    ) -> Result<Vec<TaskSnapshot>, sqlx::Error> {
        let user_clause = match mode {
            ClaimMode::Pool => "",
            ClaimMode::User(_) => "AND u.id = $4",
        };
        let dependency_gate = dependency_satisfied(3);

        let query = format!(
            "SELECT t.id AS task_id, u.id AS user_id, u.credits, \
                    u.allow_pool_workers, u.allow_local_workers, \
                    (SELECT COUNT(*) FROM tasks r \
                         JOIN projects rp ON rp.id = r.project_id \
                     WHERE rp.user_id = u.id AND r.status_id = $2) AS in_progress_count, \
                    {dependency_gate} AS dependency_satisfied \
             FROM tasks t \
             JOIN projects p ON p.id = t.project_id \
             JOIN users u ON u.id = p.user_id \
             WHERE t.status_id = $1 {user_clause} \
             ORDER BY t.created_at ASC"
        );

        let mut q = sqlx::query_as::<_, SnapshotRow>(&query)
            .bind(TaskStatus::Queued.id())
            .bind(TaskStatus::InProgress.id())
            .bind(TaskStatus::Complete.id());

        if let ClaimMode::User(user_id) = mode {
            q = q.bind(user_id);
        }

        let rows = q.fetch_all(pool).await?;
        Ok(rows.into_iter().map(TaskSnapshot::from).collect())
    }

    // ── Completion / failure ─────────────────────────────────────────────

    /// Mark an in-progress task Complete with its result payload, stamping
    /// `generation_processed_at`.
    ///
    /// Returns `None` if the task was not in progress; the caller decides
    /// whether that is the idempotent already-Complete case or a conflict.
    pub async fn mark_complete(
        pool: &PgPool,
        task_id: DbId,
        result: &serde_json::Value,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks \
             SET status_id = $2, result = $3, \
                 generation_processed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(TaskStatus::Complete.id())
            .bind(result)
            .bind(TaskStatus::InProgress.id())
            .fetch_optional(pool)
            .await
    }

    /// Record a worker-reported failure.
    ///
    /// Increments `attempts`; at [`RETRY_CEILING`] the task becomes
    /// terminally Failed, otherwise it returns to Queued with `worker_id`
    /// and `generation_started_at` cleared so it can be reclaimed. Always
    /// stamps `generation_processed_at` and the error message.
    pub async fn mark_failed(
        pool: &PgPool,
        task_id: DbId,
        error_message: &str,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks \
             SET attempts = attempts + 1, \
                 status_id = CASE WHEN attempts + 1 >= $3 THEN $4 ELSE $5 END, \
                 worker_id = CASE WHEN attempts + 1 >= $3 THEN worker_id ELSE NULL END, \
                 generation_started_at = CASE WHEN attempts + 1 >= $3 \
                     THEN generation_started_at ELSE NULL END, \
                 error_message = $2, \
                 generation_processed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $6 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(error_message)
            .bind(RETRY_CEILING)
            .bind(TaskStatus::Failed.id())
            .bind(TaskStatus::Queued.id())
            .bind(TaskStatus::InProgress.id())
            .fetch_optional(pool)
            .await
    }

    /// Cancel a task if it is not already in a terminal state.
    ///
    /// Returns `true` if the task was cancelled, `false` if it had already
    /// reached Complete, Failed, or Cancelled.
    pub async fn cancel(pool: &PgPool, task_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks \
             SET status_id = $2, generation_processed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4, $5)",
        )
        .bind(task_id)
        .bind(TaskStatus::Cancelled.id())
        .bind(TaskStatus::Complete.id())
        .bind(TaskStatus::Failed.id())
        .bind(TaskStatus::Cancelled.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Reaping ──────────────────────────────────────────────────────────

    /// Requeue every in-progress task held by the given (dead) workers that
    /// still has retries left, clearing `worker_id` and
    /// `generation_started_at`.
    ///
    /// Idempotent: terminal tasks and tasks at the retry ceiling are never
    /// touched. Returns the requeued task IDs.
    pub async fn reap(pool: &PgPool, worker_ids: &[DbId]) -> Result<Vec<DbId>, sqlx::Error> {
        if worker_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, DbId>(
            "UPDATE tasks \
             SET status_id = $2, worker_id = NULL, \
                 generation_started_at = NULL, updated_at = NOW() \
             WHERE worker_id = ANY($1) AND status_id = $3 AND attempts < $4 \
             RETURNING id",
        )
        .bind(worker_ids)
        .bind(TaskStatus::Queued.id())
        .bind(TaskStatus::InProgress.id())
        .bind(RETRY_CEILING)
        .fetch_all(pool)
        .await
    }

    // ── Completion-pipeline support (transaction-scoped) ─────────────────

    /// Lock a task row for the duration of the completion transaction.
    pub async fn lock_for_completion(
        conn: &mut PgConnection,
        task_id: DbId,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .fetch_optional(conn)
            .await
    }

    /// Flip `generation_created`, conditional on it still being false.
    /// Returns whether the flag was actually set.
    pub async fn set_generation_created(
        conn: &mut PgConnection,
        task_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET generation_created = true, updated_at = NOW() \
             WHERE id = $1 AND generation_created = false",
        )
        .bind(task_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
