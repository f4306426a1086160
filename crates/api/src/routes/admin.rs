//! Route definitions for the `/admin` surface (service credential required,
//! enforced by the handlers' `RequireService` extractor).

use axum::routing::post;
use axum::Router;

use crate::handlers::{credits, workers};
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST   /workers/reap   -> reap_workers
/// POST   /credits        -> append_credit
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workers/reap", post(workers::reap_workers))
        .route("/credits", post(credits::append_credit))
}
