pub mod admin;
pub mod credits;
pub mod health;
pub mod tasks;
pub mod workers;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /tasks                      create, claim, get, complete, fail, cancel
/// /queue                      claimability diagnostics (non-mutating)
/// /projects/{id}/tasks        per-project task listing
/// /workers                    list (derived health), heartbeat
/// /credits                    balance + ledger entries
/// /admin/workers/reap         manual reap (service only)
/// /admin/credits              ledger append (service only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tasks", tasks::router())
        .route("/queue", get(handlers::tasks::queue_status))
        .route(
            "/projects/{id}/tasks",
            get(handlers::tasks::list_project_tasks),
        )
        .nest("/workers", workers::router())
        .nest("/credits", credits::router())
        .nest("/admin", admin::router())
}
