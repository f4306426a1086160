//! Route definitions for the `/tasks` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/tasks`.
///
/// ```text
/// POST   /               -> create_task
/// POST   /claim          -> claim_task (or counting probe)
/// GET    /{id}           -> get_task
/// POST   /{id}/complete  -> complete_task
/// POST   /{id}/fail      -> fail_task
/// POST   /{id}/cancel    -> cancel_task
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(tasks::create_task))
        .route("/claim", post(tasks::claim_task))
        .route("/{id}", get(tasks::get_task))
        .route("/{id}/complete", post(tasks::complete_task))
        .route("/{id}/fail", post(tasks::fail_task))
        .route("/{id}/cancel", post(tasks::cancel_task))
}
