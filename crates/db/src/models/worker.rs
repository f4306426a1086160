//! Worker entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `workers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Worker {
    pub id: DbId,
    pub name: String,
    pub instance_type: String,
    pub status_id: StatusId,
    pub last_heartbeat_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
    pub registered_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `POST /api/v1/workers/heartbeat`.
///
/// Unknown names are auto-registered as externally-managed workers.
#[derive(Debug, Clone, Deserialize)]
pub struct Heartbeat {
    pub name: String,
    pub instance_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Age of a worker's oldest in-progress claim, for health classification.
#[derive(Debug, Clone, FromRow)]
pub struct ClaimAge {
    pub worker_id: DbId,
    pub oldest_claim_secs: f64,
}
