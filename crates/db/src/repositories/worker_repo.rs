//! Repository for the `workers` table.

use sqlx::PgPool;
use vireo_core::types::DbId;

use crate::models::status::{StatusId, WorkerStatus};
use crate::models::worker::{ClaimAge, Heartbeat, Worker};

/// Column list for `workers` queries.
const COLUMNS: &str = "\
    id, name, instance_type, status_id, last_heartbeat_at, metadata, \
    registered_at, created_at, updated_at";

/// Provides registration, heartbeat, and liveness queries for workers.
pub struct WorkerRepo;

impl WorkerRepo {
    /// Record a heartbeat, upserting by name.
    ///
    /// Unknown names are auto-registered as externally-managed workers in
    /// Active status. On conflict the heartbeat timestamp is refreshed and
    /// metadata is shallow-merged over the stored document. A heartbeat
    /// revives Inactive/Spawning/Error workers to Active but never
    /// resurrects a Terminating or Terminated one.
    pub async fn heartbeat(pool: &PgPool, input: &Heartbeat) -> Result<Worker, sqlx::Error> {
        let query = format!(
            "INSERT INTO workers (name, instance_type, status_id, metadata, last_heartbeat_at) \
             VALUES ($1, COALESCE($2, 'external'), $3, COALESCE($4, '{{}}'::jsonb), NOW()) \
             ON CONFLICT (name) DO UPDATE SET \
                last_heartbeat_at = NOW(), \
                instance_type = COALESCE($2, workers.instance_type), \
                metadata = workers.metadata || COALESCE($4, '{{}}'::jsonb), \
                status_id = CASE WHEN workers.status_id IN ($5, $6, $7) \
                    THEN $3 ELSE workers.status_id END, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(&input.name)
            .bind(&input.instance_type)
            .bind(WorkerStatus::Active.id())
            .bind(&input.metadata)
            .bind(WorkerStatus::Inactive.id())
            .bind(WorkerStatus::Spawning.id())
            .bind(WorkerStatus::Error.id())
            .fetch_one(pool)
            .await
    }

    /// Find a worker by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Worker>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers WHERE id = $1");
        sqlx::query_as::<_, Worker>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all workers ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Worker>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers ORDER BY name ASC");
        sqlx::query_as::<_, Worker>(&query).fetch_all(pool).await
    }

    /// Workers whose last heartbeat is older than `stale_secs` (or missing)
    /// and whose status suggests they should be alive.
    pub async fn stale(pool: &PgPool, stale_secs: i64) -> Result<Vec<Worker>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workers \
             WHERE status_id IN ($2, $3) \
               AND (last_heartbeat_at IS NULL \
                    OR last_heartbeat_at < NOW() - ($1 * INTERVAL '1 second')) \
             ORDER BY name ASC"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(stale_secs)
            .bind(WorkerStatus::Active.id())
            .bind(WorkerStatus::Spawning.id())
            .fetch_all(pool)
            .await
    }

    /// Update the status of a worker (e.g. Terminating before shutdown).
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status_id: StatusId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE workers SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Per-worker age of the oldest in-progress claim, for the derived
    /// health classification. Workers holding no claims are absent.
    pub async fn oldest_claim_ages(pool: &PgPool) -> Result<Vec<ClaimAge>, sqlx::Error> {
        sqlx::query_as::<_, ClaimAge>(
            "SELECT worker_id, \
                    EXTRACT(EPOCH FROM NOW() - MIN(generation_started_at))::DOUBLE PRECISION \
                        AS oldest_claim_secs \
             FROM tasks \
             WHERE status_id = $1 AND worker_id IS NOT NULL \
               AND generation_started_at IS NOT NULL \
             GROUP BY worker_id",
        )
        .bind(crate::models::status::TaskStatus::InProgress.id())
        .fetch_all(pool)
        .await
    }
}
