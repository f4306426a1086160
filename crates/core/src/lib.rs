//! Vireo domain core.
//!
//! Zero internal dependencies: shared types, the domain error enum, the task
//! lifecycle state machine, admission-control predicates, worker health
//! classification, and defensive result-payload parsing. Used by both the
//! persistence layer and the API server.

pub mod admission;
pub mod error;
pub mod lifecycle;
pub mod payload;
pub mod roles;
pub mod types;
pub mod worker_health;
