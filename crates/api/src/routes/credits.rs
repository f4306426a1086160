//! Route definitions for the `/credits` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::credits;
use crate::state::AppState;

/// Routes mounted at `/credits`.
///
/// ```text
/// GET    /   -> get_credits (balance + entries)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(credits::get_credits))
}
