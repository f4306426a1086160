//! Task lifecycle state machine.
//!
//! This module lives in `core` (zero internal deps) so it can be used by both
//! the API/repository layer and any worker or CLI tooling.

/// Task status IDs matching `task_statuses` seed data (1-based SMALLSERIAL).
///
/// The state machine is intentionally duplicated from the `db` crate's
/// `TaskStatus` enum because `core` must have zero internal deps.
pub mod state_machine {
    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states (Complete=3, Failed=4, Cancelled=5) return an empty
    /// slice because no further transitions are allowed.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Queued -> InProgress (claim), Cancelled
            1 => &[2, 5],
            // InProgress -> Complete, Failed, Cancelled, Queued (retry/reap)
            2 => &[3, 4, 5, 1],
            // Terminal states: Complete, Failed, Cancelled
            3 | 4 | 5 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// A terminal status never changes again (the `generation_created`
    /// flag is the single exception and is not a status).
    pub fn is_terminal(status: i16) -> bool {
        matches!(status, 3 | 4 | 5)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            let from_name = status_name(from);
            let to_name = status_name(to);
            Err(format!(
                "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Queued",
            2 => "InProgress",
            3 => "Complete",
            4 => "Failed",
            5 => "Cancelled",
            _ => "Unknown",
        }
    }
}
