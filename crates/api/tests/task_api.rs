//! HTTP-level integration tests for the task lifecycle endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, get_anonymous, post_json, seed_user_with_project, seed_worker};
use sqlx::PgPool;
use vireo_db::repositories::{CreditRepo, GenerationRepo};

// ---------------------------------------------------------------------------
// Create / get
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_task_returns_201(pool: PgPool) {
    let user = seed_user_with_project(&pool, "create", 5.0).await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {"prompt": "a lighthouse at dawn"},
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["task_type"], "text_to_video");
    assert_eq!(json["data"]["status_id"], 1);
    assert_eq!(json["data"]["attempts"], 0);
    assert!(json["data"]["id"].is_number());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_task_in_foreign_project_forbidden(pool: PgPool) {
    let owner = seed_user_with_project(&pool, "owner", 5.0).await;
    let intruder = seed_user_with_project(&pool, "intruder", 5.0).await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/tasks",
        &intruder.token,
        serde_json::json!({
            "project_id": owner.project_id,
            "task_type": "text_to_video",
            "params": {},
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_task_with_unknown_dependency_rejected(pool: PgPool) {
    let user = seed_user_with_project(&pool, "baddep", 5.0).await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {},
            "dependant_on": 999999,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_task_requires_auth(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get_anonymous(app, "/api/v1/tasks/1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_foreign_task_forbidden(pool: PgPool) {
    let owner = seed_user_with_project(&pool, "towner", 5.0).await;
    let intruder = seed_user_with_project(&pool, "tintruder", 5.0).await;

    let app = common::build_test_app(pool.clone());
    let created = post_json(
        app,
        "/api/v1/tasks",
        &owner.token,
        serde_json::json!({
            "project_id": owner.project_id,
            "task_type": "text_to_video",
            "params": {},
        }),
    )
    .await;
    let task_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = get(app, &format!("/api/v1/tasks/{task_id}"), &intruder.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // A service credential can see any task.
    let app = common::build_test_app(pool);
    let response = get(
        app,
        &format!("/api/v1/tasks/{task_id}"),
        &common::service_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_project_tasks(pool: PgPool) {
    let user = seed_user_with_project(&pool, "lister", 5.0).await;
    let other = seed_user_with_project(&pool, "lother", 5.0).await;

    for task_type in ["text_to_image", "text_to_video"] {
        let app = common::build_test_app(pool.clone());
        post_json(
            app,
            "/api/v1/tasks",
            &user.token,
            serde_json::json!({
                "project_id": user.project_id,
                "task_type": task_type,
                "params": {},
            }),
        )
        .await;
    }

    let app = common::build_test_app(pool.clone());
    let response = get(
        app,
        &format!("/api/v1/projects/{}/tasks", user.project_id),
        &user.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let app = common::build_test_app(pool);
    let response = get(
        app,
        &format!("/api/v1/projects/{}/tasks", user.project_id),
        &other.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_service_claim_and_empty_queue(pool: PgPool) {
    let user = seed_user_with_project(&pool, "claim", 5.0).await;
    let worker_id = seed_worker(&pool, "pool-worker").await;

    let app = common::build_test_app(pool.clone());
    let created = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {"prompt": "x"},
        }),
    )
    .await;
    let task_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        // run_type / same_model_only are legacy agent hints; they must
        // parse but have no effect on the claim.
        serde_json::json!({
            "worker_id": worker_id,
            "run_type": "default",
            "same_model_only": false,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["task_id"].as_i64(), Some(task_id));
    assert_eq!(json["data"]["user_id"].as_i64(), Some(user.user_id));
    assert_eq!(json["data"]["params"]["prompt"], "x");

    // Nothing left: 204.
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        serde_json::json!({"worker_id": worker_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_draining_worker_claim_conflicts(pool: PgPool) {
    use vireo_db::models::status::WorkerStatus;
    use vireo_db::repositories::WorkerRepo;

    let user = seed_user_with_project(&pool, "draining", 5.0).await;
    let worker_id = seed_worker(&pool, "retiring-worker").await;

    let app = common::build_test_app(pool.clone());
    post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {},
        }),
    )
    .await;

    WorkerRepo::set_status(&pool, worker_id, WorkerStatus::Terminating.id())
        .await
        .unwrap();

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        serde_json::json!({"worker_id": worker_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_claim_without_worker_id_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_count_probe_reports_without_claiming(pool: PgPool) {
    let user = seed_user_with_project(&pool, "probe", 5.0).await;

    let app = common::build_test_app(pool.clone());
    post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {},
        }),
    )
    .await;

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        serde_json::json!({"count": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total_queued"], 1);
    assert_eq!(json["data"]["eligible"], 1);

    // The probe claimed nothing; the queue endpoint agrees.
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/queue", &common::service_token()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total_queued"], 1);
}

// ---------------------------------------------------------------------------
// Complete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_complete_records_generation_and_debits(pool: PgPool) {
    let user = seed_user_with_project(&pool, "complete", 10.0).await;
    let worker_id = seed_worker(&pool, "finisher").await;

    let app = common::build_test_app(pool.clone());
    let created = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {"prompt": "x", "credits_cost": 2.5},
        }),
    )
    .await;
    let task_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        serde_json::json!({"worker_id": worker_id}),
    )
    .await;

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        &format!("/api/v1/tasks/{task_id}/complete"),
        &common::service_token(),
        serde_json::json!({
            "result": {"output_location": "http://192.168.1.7:8188/files/out/clip.mp4"},
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status_id"], 3);
    assert_eq!(json["data"]["generation_created"], true);

    // The artifact record exists, with the local-network host stripped.
    let generations = GenerationRepo::find_by_task(&pool, task_id).await.unwrap();
    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0].location, "files/out/clip.mp4");

    // The declared cost was debited from the owner's ledger.
    let balance = CreditRepo::balance(&pool, user.user_id).await.unwrap();
    assert_eq!(balance, 7.5);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_complete_is_idempotent(pool: PgPool) {
    let user = seed_user_with_project(&pool, "dupdone", 10.0).await;
    let worker_id = seed_worker(&pool, "repeater").await;

    let app = common::build_test_app(pool.clone());
    let created = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {"credits_cost": 1.0},
        }),
    )
    .await;
    let task_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        serde_json::json!({"worker_id": worker_id}),
    )
    .await;

    for _ in 0..2 {
        let app = common::build_test_app(pool.clone());
        let response = post_json(
            app,
            &format!("/api/v1/tasks/{task_id}/complete"),
            &common::service_token(),
            serde_json::json!({"result": {"output_location": "files/out/a.mp4"}}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // One generation, one debit, despite two reports.
    let generations = GenerationRepo::find_by_task(&pool, task_id).await.unwrap();
    assert_eq!(generations.len(), 1);
    assert_eq!(
        CreditRepo::balance(&pool, user.user_id).await.unwrap(),
        9.0
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_complete_queued_task_conflicts(pool: PgPool) {
    let user = seed_user_with_project(&pool, "notrunning", 5.0).await;

    let app = common::build_test_app(pool.clone());
    let created = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {},
        }),
    )
    .await;
    let task_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        &format!("/api/v1/tasks/{task_id}/complete"),
        &common::service_token(),
        serde_json::json!({"result": {}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Fail / cancel
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fail_requeues_task(pool: PgPool) {
    let user = seed_user_with_project(&pool, "failer", 5.0).await;
    let worker_id = seed_worker(&pool, "crasher").await;

    let app = common::build_test_app(pool.clone());
    let created = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {},
        }),
    )
    .await;
    let task_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    post_json(
        app,
        "/api/v1/tasks/claim",
        &common::service_token(),
        serde_json::json!({"worker_id": worker_id}),
    )
    .await;

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        &format!("/api/v1/tasks/{task_id}/fail"),
        &common::service_token(),
        serde_json::json!({"error_message": "cuda out of memory"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status_id"], 1);
    assert_eq!(json["data"]["attempts"], 1);
    assert_eq!(json["data"]["error_message"], "cuda out of memory");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cancel_then_cancel_again(pool: PgPool) {
    let user = seed_user_with_project(&pool, "canceller", 5.0).await;

    let app = common::build_test_app(pool.clone());
    let created = post_json(
        app,
        "/api/v1/tasks",
        &user.token,
        serde_json::json!({
            "project_id": user.project_id,
            "task_type": "text_to_video",
            "params": {},
        }),
    )
    .await;
    let task_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        &format!("/api/v1/tasks/{task_id}/cancel"),
        &user.token,
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        &format!("/api/v1/tasks/{task_id}/cancel"),
        &user.token,
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
