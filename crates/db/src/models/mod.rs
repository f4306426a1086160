//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts

pub mod credit;
pub mod generation;
pub mod project;
pub mod shot;
pub mod status;
pub mod task;
pub mod user;
pub mod worker;
