//! Health endpoint tests.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_anonymous};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_reports_ok(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get_anonymous(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert!(json["version"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_route_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get_anonymous(app, "/api/v1/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
