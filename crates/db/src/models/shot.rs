//! Shot entity model: the container generations are appended into.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::types::{DbId, Timestamp};

/// A row from the `shots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Shot {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a shot.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateShot {
    pub project_id: DbId,
    pub name: String,
}
