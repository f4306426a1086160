//! Admission-control predicates and queue diagnostics.
//!
//! The claim engine's eligibility rules are expressed once, as pure functions
//! over per-task snapshots, so the SQL claim path and the non-mutating
//! counting mode cannot drift apart. Lives in `core` to maintain the zero
//! internal dependency constraint.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A user may have at most this many tasks in progress at once.
pub const MAX_IN_PROGRESS_PER_USER: i64 = 5;

/// A task that fails this many times becomes terminally Failed.
pub const RETRY_CEILING: i32 = 3;

/// A worker with no heartbeat for this long is considered stale and its
/// in-progress tasks become eligible for reaping.
pub const HEARTBEAT_STALE_SECS: i64 = 300;

/// An in-progress task older than this with no completion is reported as
/// stuck by the worker health classification.
pub const STUCK_TASK_SECS: i64 = 600;

/// How often the heartbeat monitor checks for stale workers.
pub const HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Claim modes
// ---------------------------------------------------------------------------

/// The two claim contexts.
///
/// Pool mode draws from the whole queue on behalf of shared workers; user
/// mode restricts the eligible set to a single user's tasks and additionally
/// requires that user to permit local execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMode {
    Pool,
    User(DbId),
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Why a queued task is not claimable right now.
///
/// A task may fail several predicates at once; [`evaluate`] reports the first
/// failure in the order the variants are declared here, and the counting mode
/// buckets each task under that single reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    NoCredits,
    ExecutionModeDisabled,
    AtConcurrencyCap,
    DependencyUnsatisfied,
}

/// Per-task eligibility snapshot, as read from the store at one instant.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub task_id: DbId,
    pub user_id: DbId,
    pub credits: f64,
    pub allow_pool_workers: bool,
    pub allow_local_workers: bool,
    pub in_progress_count: i64,
    pub dependency_satisfied: bool,
}

/// Evaluate the admission predicate for one queued task.
///
/// Mirrors the WHERE clause of the claim SQL exactly. Admission is binary:
/// `credits > 0` is required, but the next task's cost is not checked against
/// the remaining balance.
pub fn evaluate(snapshot: &TaskSnapshot, mode: ClaimMode) -> Result<(), IneligibleReason> {
    if snapshot.credits <= 0.0 {
        return Err(IneligibleReason::NoCredits);
    }

    let mode_permitted = match mode {
        ClaimMode::Pool => snapshot.allow_pool_workers,
        ClaimMode::User(_) => snapshot.allow_local_workers,
    };
    if !mode_permitted {
        return Err(IneligibleReason::ExecutionModeDisabled);
    }

    if snapshot.in_progress_count >= MAX_IN_PROGRESS_PER_USER {
        return Err(IneligibleReason::AtConcurrencyCap);
    }

    if !snapshot.dependency_satisfied {
        return Err(IneligibleReason::DependencyUnsatisfied);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Diagnostics (counting mode)
// ---------------------------------------------------------------------------

/// Per-user slice of the queue diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct UserQueueSnapshot {
    pub user_id: DbId,
    pub queued: i64,
    pub eligible: i64,
    pub in_progress: i64,
    pub credits: f64,
    pub allow_pool_workers: bool,
    pub allow_local_workers: bool,
}

/// Aggregate answer to "how many tasks could be claimed right now, and if
/// none, why not". Produced without mutating any state.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDiagnostics {
    pub total_queued: i64,
    pub eligible: i64,
    pub no_credits: i64,
    pub execution_mode_disabled: i64,
    pub at_concurrency_cap: i64,
    pub dependency_unsatisfied: i64,
    pub users: Vec<UserQueueSnapshot>,
}

/// Fold per-task snapshots into [`QueueDiagnostics`].
pub fn summarize(snapshots: &[TaskSnapshot], mode: ClaimMode) -> QueueDiagnostics {
    let mut diag = QueueDiagnostics {
        total_queued: snapshots.len() as i64,
        eligible: 0,
        no_credits: 0,
        execution_mode_disabled: 0,
        at_concurrency_cap: 0,
        dependency_unsatisfied: 0,
        users: Vec::new(),
    };

    let mut per_user: BTreeMap<DbId, UserQueueSnapshot> = BTreeMap::new();

    for snapshot in snapshots {
        let user = per_user
            .entry(snapshot.user_id)
            .or_insert_with(|| UserQueueSnapshot {
                user_id: snapshot.user_id,
                queued: 0,
                eligible: 0,
                in_progress: snapshot.in_progress_count,
                credits: snapshot.credits,
                allow_pool_workers: snapshot.allow_pool_workers,
                allow_local_workers: snapshot.allow_local_workers,
            });
        user.queued += 1;

        match evaluate(snapshot, mode) {
            Ok(()) => {
                diag.eligible += 1;
                user.eligible += 1;
            }
            Err(IneligibleReason::NoCredits) => diag.no_credits += 1,
            Err(IneligibleReason::ExecutionModeDisabled) => diag.execution_mode_disabled += 1,
            Err(IneligibleReason::AtConcurrencyCap) => diag.at_concurrency_cap += 1,
            Err(IneligibleReason::DependencyUnsatisfied) => diag.dependency_unsatisfied += 1,
        }
    }

    diag.users = per_user.into_values().collect();
    diag
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TaskSnapshot {
        TaskSnapshot {
            task_id: 1,
            user_id: 10,
            credits: 3.0,
            allow_pool_workers: true,
            allow_local_workers: true,
            in_progress_count: 0,
            dependency_satisfied: true,
        }
    }

    #[test]
    fn fully_eligible_task_passes() {
        assert!(evaluate(&snapshot(), ClaimMode::Pool).is_ok());
        assert!(evaluate(&snapshot(), ClaimMode::User(10)).is_ok());
    }

    #[test]
    fn zero_credits_blocks_admission() {
        let mut s = snapshot();
        s.credits = 0.0;
        assert_eq!(
            evaluate(&s, ClaimMode::Pool),
            Err(IneligibleReason::NoCredits)
        );
    }

    #[test]
    fn negative_credits_blocks_admission() {
        let mut s = snapshot();
        s.credits = -2.5;
        assert_eq!(
            evaluate(&s, ClaimMode::Pool),
            Err(IneligibleReason::NoCredits)
        );
    }

    #[test]
    fn pool_mode_respects_pool_flag() {
        let mut s = snapshot();
        s.allow_pool_workers = false;
        assert_eq!(
            evaluate(&s, ClaimMode::Pool),
            Err(IneligibleReason::ExecutionModeDisabled)
        );
        // Local execution is still allowed.
        assert!(evaluate(&s, ClaimMode::User(10)).is_ok());
    }

    #[test]
    fn user_mode_respects_local_flag() {
        let mut s = snapshot();
        s.allow_local_workers = false;
        assert_eq!(
            evaluate(&s, ClaimMode::User(10)),
            Err(IneligibleReason::ExecutionModeDisabled)
        );
        assert!(evaluate(&s, ClaimMode::Pool).is_ok());
    }

    #[test]
    fn concurrency_cap_blocks_sixth_claim() {
        let mut s = snapshot();
        s.in_progress_count = MAX_IN_PROGRESS_PER_USER;
        assert_eq!(
            evaluate(&s, ClaimMode::Pool),
            Err(IneligibleReason::AtConcurrencyCap)
        );
        s.in_progress_count = MAX_IN_PROGRESS_PER_USER - 1;
        assert!(evaluate(&s, ClaimMode::Pool).is_ok());
    }

    #[test]
    fn unsatisfied_dependency_blocks_admission() {
        let mut s = snapshot();
        s.dependency_satisfied = false;
        assert_eq!(
            evaluate(&s, ClaimMode::Pool),
            Err(IneligibleReason::DependencyUnsatisfied)
        );
    }

    #[test]
    fn reasons_are_reported_in_declared_order() {
        let mut s = snapshot();
        s.credits = 0.0;
        s.dependency_satisfied = false;
        // NoCredits wins over DependencyUnsatisfied.
        assert_eq!(
            evaluate(&s, ClaimMode::Pool),
            Err(IneligibleReason::NoCredits)
        );
    }

    #[test]
    fn summarize_buckets_by_reason_and_user() {
        let mut blocked = snapshot();
        blocked.task_id = 2;
        blocked.user_id = 20;
        blocked.credits = 0.0;

        let mut capped = snapshot();
        capped.task_id = 3;
        capped.user_id = 20;
        capped.credits = 1.0;
        capped.in_progress_count = MAX_IN_PROGRESS_PER_USER;

        let diag = summarize(&[snapshot(), blocked, capped], ClaimMode::Pool);
        assert_eq!(diag.total_queued, 3);
        assert_eq!(diag.eligible, 1);
        assert_eq!(diag.no_credits, 1);
        assert_eq!(diag.at_concurrency_cap, 1);
        assert_eq!(diag.dependency_unsatisfied, 0);
        assert_eq!(diag.users.len(), 2);

        let user_20 = diag.users.iter().find(|u| u.user_id == 20).unwrap();
        assert_eq!(user_20.queued, 2);
        assert_eq!(user_20.eligible, 0);
    }

    #[test]
    fn summarize_empty_queue() {
        let diag = summarize(&[], ClaimMode::Pool);
        assert_eq!(diag.total_queued, 0);
        assert_eq!(diag.eligible, 0);
        assert!(diag.users.is_empty());
    }
}
