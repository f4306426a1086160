//! Data-access layer: zero-sized repository structs over `sqlx` queries.
//!
//! Repositories take the pool (or, for transactional steps, a
//! `&mut PgConnection`) per call rather than holding state.

pub mod credit_repo;
pub mod generation_repo;
pub mod project_repo;
pub mod shot_repo;
pub mod task_repo;
pub mod user_repo;
pub mod worker_repo;

pub use credit_repo::CreditRepo;
pub use generation_repo::GenerationRepo;
pub use project_repo::ProjectRepo;
pub use shot_repo::ShotRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
pub use worker_repo::WorkerRepo;
