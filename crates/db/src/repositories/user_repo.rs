//! Repository for the `users` table.

use sqlx::PgPool;
use vireo_core::types::DbId;

use crate::models::user::{CreateUser, User};

/// Column list for `users` queries.
const COLUMNS: &str = "\
    id, email, display_name, credits, allow_pool_workers, allow_local_workers, \
    created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Create a user. New accounts start with a zero balance.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, display_name, allow_pool_workers, allow_local_workers) \
             VALUES ($1, COALESCE($2, split_part($1, '@', 1)), \
                     COALESCE($3, true), COALESCE($4, true)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.display_name)
            .bind(input.allow_pool_workers)
            .bind(input.allow_local_workers)
            .fetch_one(pool)
            .await
    }

    /// Find a user by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Toggle which execution modes this user's tasks may run under.
    pub async fn set_worker_flags(
        pool: &PgPool,
        id: DbId,
        allow_pool: bool,
        allow_local: bool,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET \
                allow_pool_workers = $2, allow_local_workers = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(allow_pool)
            .bind(allow_local)
            .fetch_optional(pool)
            .await
    }
}
