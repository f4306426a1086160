//! Shared helpers for HTTP-level integration tests.
//!
//! Builds the production router (same middleware stack as `main.rs`) on top
//! of a `#[sqlx::test]` pool, and mints JWTs directly so tests do not need a
//! token-issuing service.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use vireo_api::auth::jwt::{generate_access_token, JwtConfig};
use vireo_api::config::ServerConfig;
use vireo_api::router::build_app_router;
use vireo_api::state::AppState;
use vireo_core::roles::{ROLE_SERVICE, ROLE_USER};
use vireo_core::types::DbId;
use vireo_db::models::credit::AppendEntry;
use vireo_db::models::project::CreateProject;
use vireo_db::models::status::CreditEntryType;
use vireo_db::models::user::CreateUser;
use vireo_db::models::worker::Heartbeat;
use vireo_db::repositories::{CreditRepo, ProjectRepo, UserRepo, WorkerRepo};

/// Build a test `ServerConfig` with safe defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Mint a user-role bearer token for the given user id.
pub fn user_token(user_id: DbId) -> String {
    generate_access_token(user_id, ROLE_USER, &test_config().jwt)
        .expect("token generation should succeed")
}

/// Mint a service-role bearer token.
pub fn service_token() -> String {
    generate_access_token(0, ROLE_SERVICE, &test_config().jwt)
        .expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// An unauthenticated GET, for exercising the 401 paths.
pub async fn get_anonymous(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be valid JSON")
}

// ---------------------------------------------------------------------------
// Seed helpers (straight through the repositories; the API has no user
// provisioning surface)
// ---------------------------------------------------------------------------

/// A funded user with one project.
pub struct SeededUser {
    pub user_id: DbId,
    pub project_id: DbId,
    pub token: String,
}

pub async fn seed_user_with_project(pool: &PgPool, tag: &str, credits: f64) -> SeededUser {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email: format!("{tag}@test.dev"),
            display_name: None,
            allow_pool_workers: Some(true),
            allow_local_workers: Some(true),
        },
    )
    .await
    .unwrap();
    if credits != 0.0 {
        CreditRepo::append(
            pool,
            &AppendEntry {
                user_id: user.id,
                amount: credits,
                entry_type: CreditEntryType::Purchase,
                task_id: None,
                note: None,
            },
        )
        .await
        .unwrap();
    }
    let project = ProjectRepo::create(
        pool,
        &CreateProject {
            user_id: user.id,
            name: tag.to_string(),
        },
    )
    .await
    .unwrap();
    SeededUser {
        user_id: user.id,
        project_id: project.id,
        token: user_token(user.id),
    }
}

pub async fn seed_worker(pool: &PgPool, name: &str) -> DbId {
    WorkerRepo::heartbeat(
        pool,
        &Heartbeat {
            name: name.to_string(),
            instance_type: None,
            metadata: None,
        },
    )
    .await
    .unwrap()
    .id
}
