//! Handlers for the `/workers` resource.
//!
//! Workers are identified by their unique name; the heartbeat endpoint
//! doubles as registration. Health is derived on read from heartbeat and
//! claim ages, never stored.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use vireo_core::types::DbId;
use vireo_core::worker_health::{self, WorkerHealth};
use vireo_db::models::worker::{Heartbeat, Worker};
use vireo_db::repositories::{TaskRepo, WorkerRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireService;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /admin/workers/reap`.
#[derive(Debug, Deserialize)]
pub struct ReapRequest {
    pub worker_ids: Vec<DbId>,
}

/// A worker row plus its derived health.
#[derive(Debug, Serialize)]
pub struct WorkerWithHealth {
    #[serde(flatten)]
    pub worker: Worker,
    pub health: WorkerHealth,
}

/// POST /api/v1/workers/heartbeat
///
/// Record a liveness report. Unknown names are auto-registered; metadata
/// (GPU load, queue depth, whatever the agent reports) is shallow-merged
/// into the stored document.
pub async fn heartbeat(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<Heartbeat>,
) -> AppResult<impl IntoResponse> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(vireo_core::error::CoreError::Validation(
            "worker name must not be empty".into(),
        )));
    }

    let worker = WorkerRepo::heartbeat(&state.pool, &input).await?;
    tracing::debug!(worker_id = worker.id, name = %worker.name, "Heartbeat recorded");
    Ok(Json(DataResponse { data: worker }))
}

/// GET /api/v1/workers
///
/// List all workers with derived health.
pub async fn list_workers(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let workers = WorkerRepo::list(&state.pool).await?;
    let claim_ages: HashMap<DbId, f64> = WorkerRepo::oldest_claim_ages(&state.pool)
        .await?
        .into_iter()
        .map(|age| (age.worker_id, age.oldest_claim_secs))
        .collect();

    let now = chrono::Utc::now();
    let data: Vec<WorkerWithHealth> = workers
        .into_iter()
        .map(|worker| {
            let heartbeat_age = worker
                .last_heartbeat_at
                .map(|at| (now - at).num_seconds());
            let claim_age = claim_ages.get(&worker.id).map(|secs| *secs as i64);
            let health = worker_health::classify(worker.status_id, heartbeat_age, claim_age);
            WorkerWithHealth { worker, health }
        })
        .collect();

    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/admin/workers/reap
///
/// Requeue the in-progress tasks of the given workers. The same operation
/// the heartbeat monitor runs automatically; exposed for operators dealing
/// with a known-dead worker before the staleness window elapses.
pub async fn reap_workers(
    RequireService(_auth): RequireService,
    State(state): State<AppState>,
    Json(input): Json<ReapRequest>,
) -> AppResult<impl IntoResponse> {
    let requeued = TaskRepo::reap(&state.pool, &input.worker_ids).await?;
    tracing::info!(
        workers = ?input.worker_ids,
        requeued = ?requeued,
        "Manual reap executed",
    );
    Ok((
        StatusCode::OK,
        Json(DataResponse {
            data: serde_json::json!({ "requeued_task_ids": requeued }),
        }),
    ))
}
