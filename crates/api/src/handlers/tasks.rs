//! Handlers for the `/tasks` resource and the `/queue` diagnostics view.
//!
//! The claim endpoint is the worker-facing heart of the scheduler: service
//! credentials draw from the whole pool, user credentials from their own
//! queue only. Everything else is the producer/lifecycle surface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use vireo_core::admission::{self, ClaimMode};
use vireo_core::error::CoreError;
use vireo_core::lifecycle::state_machine;
use vireo_core::payload;
use vireo_core::types::DbId;
use vireo_db::models::credit::AppendEntry;
use vireo_db::models::status::{CreditEntryType, TaskStatus, WorkerStatus};
use vireo_db::models::task::{CreateTask, Task};
use vireo_db::repositories::{CreditRepo, ProjectRepo, TaskRepo, WorkerRepo};

use crate::engine::completion;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body for `POST /tasks/claim`.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    /// Required when actually claiming; ignored in counting mode.
    pub worker_id: Option<DbId>,
    /// `true` turns the call into a non-mutating eligibility probe.
    #[serde(default)]
    pub count: bool,
    /// Scheduling hints some agents still send; accepted for wire
    /// compatibility, not consulted by admission.
    pub run_type: Option<String>,
    pub same_model_only: Option<bool>,
}

/// Body for `POST /tasks/{id}/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub result: serde_json::Value,
}

/// Body for `POST /tasks/{id}/fail`.
#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub error_message: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The claim mode implied by the caller's credential.
fn claim_mode(auth: &AuthUser) -> ClaimMode {
    if auth.is_service() {
        ClaimMode::Pool
    } else {
        ClaimMode::User(auth.user_id)
    }
}

/// Fetch a task and verify the caller owns it (or holds a service credential).
async fn find_and_authorize(
    pool: &sqlx::PgPool,
    task_id: DbId,
    auth: &AuthUser,
    action: &str,
) -> AppResult<Task> {
    let task = TaskRepo::find_by_id(pool, task_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        }))?;

    if !auth.is_service() {
        let owner = TaskRepo::owner_of(pool, task_id).await?;
        if owner != Some(auth.user_id) {
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "Cannot {action} another user's task"
            ))));
        }
    }

    Ok(task)
}

/// Debit the owner's balance when the task params declare a cost.
///
/// Runs once, on the first successful completion. Ledger failures are not
/// allowed to fail the completion report; they are logged for reconciliation.
async fn record_spend(pool: &sqlx::PgPool, task: &Task) {
    let Some(cost) = payload::credits_cost(&task.params) else {
        return;
    };
    let owner = match TaskRepo::owner_of(pool, task.id).await {
        Ok(Some(owner)) => owner,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(task_id = task.id, error = %e, "Spend: owner lookup failed");
            return;
        }
    };
    let entry = AppendEntry {
        user_id: owner,
        amount: -cost,
        entry_type: CreditEntryType::Spend,
        task_id: Some(task.id),
        note: Some(task.task_type.clone()),
    };
    match CreditRepo::append(pool, &entry).await {
        Ok(_) => {
            tracing::info!(task_id = task.id, user_id = owner, cost, "Credits debited");
        }
        Err(e) => {
            tracing::error!(task_id = task.id, user_id = owner, error = %e, "Spend append failed");
        }
    }
}

/// Run the completion pipeline, logging instead of propagating failures.
///
/// The task is already terminally Complete; a pipeline error leaves
/// `generation_created` false so the next completion report retries.
async fn run_pipeline(pool: &sqlx::PgPool, task_id: DbId) {
    match completion::run(pool, task_id).await {
        Ok(outcome) => {
            tracing::debug!(task_id, ?outcome, "Completion pipeline finished");
        }
        Err(e) => {
            tracing::error!(task_id, error = %e, "Completion pipeline failed; will retry");
        }
    }
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

/// POST /api/v1/tasks
///
/// Create a queued task in one of the caller's projects. Returns 201 with
/// the created row. A `dependant_on` referencing a nonexistent task is a
/// validation error (FK, classified as 400).
pub async fn create_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateTask>,
) -> AppResult<impl IntoResponse> {
    if input.task_type.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "task_type must not be empty".into(),
        )));
    }

    let project = ProjectRepo::find_by_id(&state.pool, input.project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: input.project_id,
        }))?;
    if !auth.is_service() && project.user_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot create tasks in another user's project".into(),
        )));
    }

    let task = TaskRepo::insert(&state.pool, &input).await?;

    tracing::info!(
        task_id = task.id,
        task_type = %task.task_type,
        project_id = task.project_id,
        "Task created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: task })))
}

/// GET /api/v1/tasks/{id}
pub async fn get_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let task = find_and_authorize(&state.pool, task_id, &auth, "view").await?;
    Ok(Json(DataResponse { data: task }))
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// POST /api/v1/tasks/claim
///
/// Claim the oldest eligible queued task for a worker, or, with
/// `count: true`, report how many tasks are claimable and why the rest are
/// not (without mutating anything). Returns 200 with the claim payload, or
/// 204 when nothing is eligible.
pub async fn claim_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ClaimRequest>,
) -> AppResult<axum::response::Response> {
    let mode = claim_mode(&auth);

    if input.count {
        let snapshots = TaskRepo::queue_snapshots(&state.pool, mode).await?;
        let diagnostics = admission::summarize(&snapshots, mode);
        return Ok(Json(DataResponse { data: diagnostics }).into_response());
    }

    let worker_id = input.worker_id.ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "worker_id is required when claiming".into(),
        ))
    })?;
    let worker = WorkerRepo::find_by_id(&state.pool, worker_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id: worker_id,
        }))?;
    // The claim SQL enforces this too; rejecting here gives the agent a
    // clear signal instead of an empty queue.
    if worker.status_id == WorkerStatus::Terminating.id()
        || worker.status_id == WorkerStatus::Terminated.id()
    {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Worker {worker_id} is shutting down and cannot claim new tasks"
        ))));
    }

    match TaskRepo::claim_next(&state.pool, worker_id, mode).await? {
        Some(claimed) => {
            tracing::info!(
                task_id = claimed.task_id,
                worker_id,
                user_id = claimed.user_id,
                "Task claimed",
            );
            Ok(Json(DataResponse { data: claimed }).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /api/v1/queue
///
/// Operator view of the same diagnostics `count: true` produces.
pub async fn queue_status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let mode = claim_mode(&auth);
    let snapshots = TaskRepo::queue_snapshots(&state.pool, mode).await?;
    let diagnostics = admission::summarize(&snapshots, mode);
    Ok(Json(DataResponse { data: diagnostics }))
}

// ---------------------------------------------------------------------------
// Complete / fail / cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/tasks/{id}/complete
///
/// Record a worker's success report. Idempotent: a repeat report on an
/// already-Complete task returns 200 without overwriting the stored result.
/// On the first completion the owner is debited any declared `credits_cost`
/// and the completion pipeline records the generation.
pub async fn complete_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
    Json(input): Json<CompleteRequest>,
) -> AppResult<impl IntoResponse> {
    let task = find_and_authorize(&state.pool, task_id, &auth, "complete").await?;

    match TaskRepo::mark_complete(&state.pool, task_id, &input.result).await? {
        Some(completed) => {
            tracing::info!(task_id, task_type = %completed.task_type, "Task completed");
            record_spend(&state.pool, &completed).await;
            run_pipeline(&state.pool, task_id).await;
            let task = TaskRepo::find_by_id(&state.pool, task_id)
                .await?
                .unwrap_or(completed);
            Ok(Json(DataResponse { data: task }))
        }
        None if task.status_id == TaskStatus::Complete.id() => {
            // Duplicate report. The pipeline is flag-guarded, so re-running
            // it here retries a previously failed generation insert and is
            // otherwise a no-op.
            run_pipeline(&state.pool, task_id).await;
            let task = TaskRepo::find_by_id(&state.pool, task_id)
                .await?
                .unwrap_or(task);
            Ok(Json(DataResponse { data: task }))
        }
        None => match state_machine::validate_transition(task.status_id, TaskStatus::Complete.id())
        {
            Err(reason) => Err(AppError::Core(CoreError::Conflict(reason))),
            // The row was InProgress on read but changed under us.
            Ok(()) => Err(AppError::Core(CoreError::Conflict(format!(
                "Task {task_id} changed state concurrently"
            )))),
        },
    }
}

/// POST /api/v1/tasks/{id}/fail
///
/// Record a worker's failure report. Below the retry ceiling the task goes
/// back to the queue; at the ceiling it becomes terminally Failed.
pub async fn fail_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
    Json(input): Json<FailRequest>,
) -> AppResult<impl IntoResponse> {
    let current = find_and_authorize(&state.pool, task_id, &auth, "fail").await?;

    match TaskRepo::mark_failed(&state.pool, task_id, &input.error_message).await? {
        Some(task) => {
            tracing::warn!(
                task_id,
                attempts = task.attempts,
                status_id = task.status_id,
                error = %input.error_message,
                "Task failure reported",
            );
            Ok(Json(DataResponse { data: task }))
        }
        None => match state_machine::validate_transition(
            current.status_id,
            TaskStatus::Failed.id(),
        ) {
            Err(reason) => Err(AppError::Core(CoreError::Conflict(reason))),
            Ok(()) => Err(AppError::Core(CoreError::Conflict(format!(
                "Task {task_id} changed state concurrently"
            )))),
        },
    }
}

/// POST /api/v1/tasks/{id}/cancel
///
/// Cancel a queued or in-progress task. Returns 204 on success, 409 if the
/// task has already reached a terminal state.
pub async fn cancel_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let task = find_and_authorize(&state.pool, task_id, &auth, "cancel").await?;
    if state_machine::is_terminal(task.status_id) {
        return Err(AppError::Core(CoreError::Conflict(
            "Task is already in a terminal state and cannot be cancelled".into(),
        )));
    }

    // The conditional UPDATE is the authority; the check above only
    // shapes the common error.
    let cancelled = TaskRepo::cancel(&state.pool, task_id).await?;
    if !cancelled {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Task {task_id} changed state concurrently"
        ))));
    }

    tracing::info!(task_id, "Task cancelled");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/projects/{id}/tasks
pub async fn list_project_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = ProjectRepo::find_by_id(&state.pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }))?;
    if !auth.is_service() && project.user_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot list another user's tasks".into(),
        )));
    }

    let tasks = TaskRepo::list_by_project(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: tasks }))
}
