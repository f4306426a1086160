//! Project entity model. Tasks resolve their owning user through a project.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::types::{DbId, Timestamp};

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub user_id: DbId,
    pub name: String,
}
