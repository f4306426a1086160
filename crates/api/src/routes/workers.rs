//! Route definitions for the `/workers` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workers;
use crate::state::AppState;

/// Routes mounted at `/workers`.
///
/// ```text
/// GET    /            -> list_workers (with derived health)
/// POST   /heartbeat   -> heartbeat (auto-registers unknown names)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(workers::list_workers))
        .route("/heartbeat", post(workers::heartbeat))
}
