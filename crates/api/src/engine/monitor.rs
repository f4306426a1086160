//! Heartbeat monitor: requeues tasks held by workers that stopped reporting.
//!
//! A periodic loop that finds workers whose last heartbeat is older than
//! [`HEARTBEAT_STALE_SECS`] and reaps their in-progress tasks back into the
//! queue. All coordination happens through the conditional row updates in
//! `TaskRepo::reap`, so running the check concurrently (or alongside the
//! admin reap endpoint) is safe.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use vireo_core::admission::{HEARTBEAT_CHECK_INTERVAL_SECS, HEARTBEAT_STALE_SECS};
use vireo_db::repositories::{TaskRepo, WorkerRepo};

/// Run the heartbeat monitor loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = HEARTBEAT_CHECK_INTERVAL_SECS,
        stale_secs = HEARTBEAT_STALE_SECS,
        "Heartbeat monitor started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_CHECK_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Heartbeat monitor stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = check_once(&pool).await {
                    tracing::error!(error = %e, "Heartbeat monitor: check failed");
                }
            }
        }
    }
}

/// One monitor pass: find stale workers, requeue their in-progress tasks.
pub async fn check_once(pool: &PgPool) -> Result<(), sqlx::Error> {
    let stale = WorkerRepo::stale(pool, HEARTBEAT_STALE_SECS).await?;
    if stale.is_empty() {
        tracing::debug!("Heartbeat monitor: all workers fresh");
        return Ok(());
    }

    let worker_ids: Vec<_> = stale.iter().map(|w| w.id).collect();
    let names: Vec<_> = stale.iter().map(|w| w.name.as_str()).collect();
    tracing::warn!(workers = ?names, "Stale workers detected");

    let requeued = TaskRepo::reap(pool, &worker_ids).await?;
    if !requeued.is_empty() {
        tracing::info!(tasks = ?requeued, "Requeued tasks from stale workers");
    }

    Ok(())
}
