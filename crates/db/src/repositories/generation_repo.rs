//! Repository for the `generations` and `shot_generations` tables.
//!
//! Inserts happen inside the completion-pipeline transaction, so the
//! write methods take `&mut PgConnection` rather than the pool.

use sqlx::{PgConnection, PgPool};
use vireo_core::types::DbId;

use crate::models::generation::{CreateGeneration, Generation, ShotGeneration};

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, task_id, project_id, location, generation_type, thumbnail_url, \
    metadata, created_at";

/// Column list for `shot_generations` queries.
const LINK_COLUMNS: &str = "id, shot_id, generation_id, position, created_at";

/// Provides artifact-record operations for the completion pipeline.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a generation row.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &CreateGeneration,
    ) -> Result<Generation, sqlx::Error> {
        let query = format!(
            "INSERT INTO generations \
                 (task_id, project_id, location, generation_type, thumbnail_url, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(input.task_id)
            .bind(input.project_id)
            .bind(&input.location)
            .bind(&input.generation_type)
            .bind(&input.thumbnail_url)
            .bind(&input.metadata)
            .fetch_one(conn)
            .await
    }

    /// Append a generation into a shot at the next ordinal position.
    ///
    /// The caller is expected to have validated that the shot exists; a
    /// dangling shot id would abort the enclosing transaction.
    pub async fn attach_to_shot(
        conn: &mut PgConnection,
        shot_id: DbId,
        generation_id: DbId,
    ) -> Result<ShotGeneration, sqlx::Error> {
        let query = format!(
            "INSERT INTO shot_generations (shot_id, generation_id, position) \
             VALUES ($1, $2, \
                 (SELECT COALESCE(MAX(position), 0) + 1 \
                  FROM shot_generations WHERE shot_id = $1)) \
             RETURNING {LINK_COLUMNS}"
        );
        sqlx::query_as::<_, ShotGeneration>(&query)
            .bind(shot_id)
            .bind(generation_id)
            .fetch_one(conn)
            .await
    }

    /// All generations produced by a task (normally zero or one).
    pub async fn find_by_task(
        pool: &PgPool,
        task_id: DbId,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations WHERE task_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// List a project's generations, newest first.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations WHERE project_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// The ordered contents of a shot.
    pub async fn shot_contents(
        pool: &PgPool,
        shot_id: DbId,
    ) -> Result<Vec<ShotGeneration>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM shot_generations \
             WHERE shot_id = $1 ORDER BY position ASC"
        );
        sqlx::query_as::<_, ShotGeneration>(&query)
            .bind(shot_id)
            .fetch_all(pool)
            .await
    }
}
