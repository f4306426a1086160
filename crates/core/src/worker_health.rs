//! Derived worker health classification.
//!
//! Health is computed from the stored worker status plus heartbeat and claim
//! ages; it is never persisted.

use serde::Serialize;

use crate::admission::{HEARTBEAT_STALE_SECS, STUCK_TASK_SECS};

/// Worker status IDs matching `worker_statuses` seed data. Duplicated from
/// the `db` crate's `WorkerStatus` enum (zero internal deps).
pub const STATUS_INACTIVE: i16 = 1;
pub const STATUS_TERMINATED: i16 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerHealth {
    Healthy,
    StaleHeartbeat,
    StuckTask,
    NoHeartbeat,
    Inactive,
    Terminated,
}

/// Classify a worker's health.
///
/// - `heartbeat_age_secs` is `None` when the worker has never sent a heartbeat.
/// - `oldest_claim_age_secs` is the age of the worker's oldest in-progress
///   claim, `None` when it holds no claims.
///
/// Inactive and Terminated statuses are reflected directly; otherwise a
/// missing or stale heartbeat takes precedence over a stuck task, since a
/// dead worker explains the stuck task.
pub fn classify(
    status_id: i16,
    heartbeat_age_secs: Option<i64>,
    oldest_claim_age_secs: Option<i64>,
) -> WorkerHealth {
    match status_id {
        STATUS_INACTIVE => return WorkerHealth::Inactive,
        STATUS_TERMINATED => return WorkerHealth::Terminated,
        _ => {}
    }

    match heartbeat_age_secs {
        None => return WorkerHealth::NoHeartbeat,
        Some(age) if age > HEARTBEAT_STALE_SECS => return WorkerHealth::StaleHeartbeat,
        Some(_) => {}
    }

    if oldest_claim_age_secs.is_some_and(|age| age > STUCK_TASK_SECS) {
        return WorkerHealth::StuckTask;
    }

    WorkerHealth::Healthy
}
