//! Generation artifact entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::types::{DbId, Timestamp};

/// A row from the `generations` table: the artifact record synthesized by
/// the completion pipeline, exactly once per eligible completed task.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    pub task_id: DbId,
    pub project_id: DbId,
    /// Opaque media pointer; already normalized to canonical form.
    pub location: String,
    pub generation_type: String,
    pub thumbnail_url: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for inserting a generation inside the completion transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGeneration {
    pub task_id: DbId,
    pub project_id: DbId,
    pub location: String,
    pub generation_type: String,
    pub thumbnail_url: Option<String>,
    pub metadata: serde_json::Value,
}

/// A row from the `shot_generations` join table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShotGeneration {
    pub id: DbId,
    pub shot_id: DbId,
    pub generation_id: DbId,
    pub position: i32,
    pub created_at: Timestamp,
}
