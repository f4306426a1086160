//! Integration tests for the append-only credit ledger and the balance
//! projection on `users.credits`.

use sqlx::PgPool;
use vireo_db::models::credit::AppendEntry;
use vireo_db::models::status::CreditEntryType;
use vireo_db::models::user::{CreateUser, User};
use vireo_db::repositories::{CreditRepo, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, email: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            display_name: None,
            allow_pool_workers: None,
            allow_local_workers: None,
        },
    )
    .await
    .unwrap()
}

fn entry(user_id: i64, amount: f64, entry_type: CreditEntryType) -> AppendEntry {
    AppendEntry {
        user_id,
        amount,
        entry_type,
        task_id: None,
        note: None,
    }
}

// ---------------------------------------------------------------------------
// Test: Appends and the balance projection
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_append_updates_projection(pool: PgPool) {
    let user = seed_user(&pool, "ledger@test.dev").await;
    assert_eq!(user.credits, 0.0);

    CreditRepo::append(&pool, &entry(user.id, 10.0, CreditEntryType::Purchase))
        .await
        .unwrap();
    CreditRepo::append(&pool, &entry(user.id, -2.5, CreditEntryType::Spend))
        .await
        .unwrap();
    CreditRepo::append(&pool, &entry(user.id, 1.0, CreditEntryType::Refund))
        .await
        .unwrap();

    let balance = CreditRepo::balance(&pool, user.id).await.unwrap();
    assert_eq!(balance, 8.5);

    // The denormalized column tracks the ledger sum.
    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(user.credits, 8.5);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_balance_may_go_negative(pool: PgPool) {
    let user = seed_user(&pool, "overdraft@test.dev").await;
    CreditRepo::append(&pool, &entry(user.id, 1.0, CreditEntryType::Purchase))
        .await
        .unwrap();
    CreditRepo::append(&pool, &entry(user.id, -4.0, CreditEntryType::Spend))
        .await
        .unwrap();

    // Admission is binary on credits > 0; a single expensive task can
    // overdraw the account and the ledger records that faithfully.
    assert_eq!(CreditRepo::balance(&pool, user.id).await.unwrap(), -3.0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_appends_keep_projection_exact(pool: PgPool) {
    let user = seed_user(&pool, "race@test.dev").await;

    // Repeated rounds of a purchase and a spend racing each other. The
    // user-row lock in append serializes the recompute, so the cached
    // column can never end up holding a sum that missed one of the rows.
    for round in 0..10 {
        let credit = {
            let pool = pool.clone();
            let user_id = user.id;
            tokio::spawn(async move {
                CreditRepo::append(&pool, &entry(user_id, 1.0, CreditEntryType::Purchase))
                    .await
                    .unwrap();
            })
        };
        let debit = {
            let pool = pool.clone();
            let user_id = user.id;
            tokio::spawn(async move {
                CreditRepo::append(&pool, &entry(user_id, -1.0, CreditEntryType::Spend))
                    .await
                    .unwrap();
            })
        };
        credit.await.unwrap();
        debit.await.unwrap();

        let cached: f64 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        let ledger = CreditRepo::balance(&pool, user.id).await.unwrap();
        assert_eq!(cached, ledger, "projection drifted on round {round}");
    }

    assert_eq!(CreditRepo::balance(&pool, user.id).await.unwrap(), 0.0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_entries_are_never_mutated(pool: PgPool) {
    let user = seed_user(&pool, "history@test.dev").await;
    CreditRepo::append(&pool, &entry(user.id, 5.0, CreditEntryType::Purchase))
        .await
        .unwrap();
    CreditRepo::append(&pool, &entry(user.id, -1.0, CreditEntryType::Spend))
        .await
        .unwrap();

    let entries = CreditRepo::entries(&pool, user.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    // Newest first.
    assert_eq!(entries[0].amount, -1.0);
    assert_eq!(entries[0].entry_type_id, CreditEntryType::Spend.id());
    assert_eq!(entries[1].amount, 5.0);
    assert_eq!(entries[1].entry_type_id, CreditEntryType::Purchase.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_entries_attributed_to_task(pool: PgPool) {
    use vireo_db::models::project::CreateProject;
    use vireo_db::models::task::CreateTask;
    use vireo_db::repositories::{ProjectRepo, TaskRepo};

    let user = seed_user(&pool, "taskspend@test.dev").await;
    let project = ProjectRepo::create(
        &pool,
        &CreateProject {
            user_id: user.id,
            name: "Spend".to_string(),
        },
    )
    .await
    .unwrap();
    let task = TaskRepo::insert(
        &pool,
        &CreateTask {
            project_id: project.id,
            task_type: "text_to_video".to_string(),
            params: serde_json::json!({}),
            dependant_on: None,
        },
    )
    .await
    .unwrap();

    CreditRepo::append(&pool, &entry(user.id, 10.0, CreditEntryType::Purchase))
        .await
        .unwrap();
    CreditRepo::append(
        &pool,
        &AppendEntry {
            user_id: user.id,
            amount: -1.5,
            entry_type: CreditEntryType::Spend,
            task_id: Some(task.id),
            note: None,
        },
    )
    .await
    .unwrap();

    let attributed = CreditRepo::entries_for_task(&pool, task.id).await.unwrap();
    assert_eq!(attributed.len(), 1);
    assert_eq!(attributed[0].amount, -1.5);
    assert_eq!(attributed[0].task_id, Some(task.id));
}
