//! Repository for the `shots` table.

use sqlx::{PgConnection, PgPool};
use vireo_core::types::DbId;

use crate::models::shot::{CreateShot, Shot};

/// Column list for `shots` queries.
const COLUMNS: &str = "id, project_id, name, created_at, updated_at";

/// Provides CRUD operations for shots.
pub struct ShotRepo;

impl ShotRepo {
    /// Create a shot in a project.
    pub async fn create(pool: &PgPool, input: &CreateShot) -> Result<Shot, sqlx::Error> {
        let query = format!(
            "INSERT INTO shots (project_id, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Shot>(&query)
            .bind(input.project_id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    /// Find a shot by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Shot>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM shots WHERE id = $1");
        sqlx::query_as::<_, Shot>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Existence check usable inside the completion-pipeline transaction,
    /// where a failed FK insert would abort the whole thing. Scoped to a
    /// project so result hints cannot reach across project boundaries.
    pub async fn exists_in(
        conn: &mut PgConnection,
        id: DbId,
        project_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM shots WHERE id = $1 AND project_id = $2)",
        )
        .bind(id)
        .bind(project_id)
        .fetch_one(conn)
        .await
    }

    /// A project's shots in creation order.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Shot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM shots WHERE project_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Shot>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}
