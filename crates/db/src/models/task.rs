//! Task entity models and DTOs for the generation queue.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::admission::TaskSnapshot;
use vireo_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub task_type: String,
    pub params: serde_json::Value,
    pub status_id: StatusId,
    pub dependant_on: Option<DbId>,
    pub project_id: DbId,
    pub worker_id: Option<DbId>,
    pub attempts: i32,
    pub generation_created: bool,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub generation_started_at: Option<Timestamp>,
    pub generation_processed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// DTO for creating a new task via `POST /api/v1/tasks`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub project_id: DbId,
    pub task_type: String,
    pub params: serde_json::Value,
    pub dependant_on: Option<DbId>,
}

/// The claim engine's answer: everything a worker needs to start executing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClaimedTask {
    pub task_id: DbId,
    pub task_type: String,
    pub params: serde_json::Value,
    pub project_id: DbId,
    pub user_id: DbId,
}

/// Read-only eligibility snapshot row feeding the counting mode.
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub task_id: DbId,
    pub user_id: DbId,
    pub credits: f64,
    pub allow_pool_workers: bool,
    pub allow_local_workers: bool,
    pub in_progress_count: i64,
    pub dependency_satisfied: bool,
}

impl From<SnapshotRow> for TaskSnapshot {
    fn from(row: SnapshotRow) -> Self {
        TaskSnapshot {
            task_id: row.task_id,
            user_id: row.user_id,
            credits: row.credits,
            allow_pool_workers: row.allow_pool_workers,
            allow_local_workers: row.allow_local_workers,
            in_progress_count: row.in_progress_count,
            dependency_satisfied: row.dependency_satisfied,
        }
    }
}
