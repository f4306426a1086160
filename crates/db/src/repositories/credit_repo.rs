//! Repository for the append-only `credit_ledger` table.
//!
//! Balances are never mutated directly: every change is an appended entry,
//! and `users.credits` is recomputed as the ledger sum inside the same
//! transaction.

use sqlx::PgPool;
use vireo_core::types::DbId;

use crate::models::credit::{AppendEntry, CreditEntry};

/// Column list for `credit_ledger` queries.
const COLUMNS: &str = "id, user_id, amount, entry_type_id, task_id, note, created_at";

/// Provides ledger appends and balance reads.
pub struct CreditRepo;

impl CreditRepo {
    /// Append an entry and refresh the user's balance in one transaction.
    ///
    /// The user row is locked first so appends for the same user serialize:
    /// each recompute then runs after every earlier append has committed,
    /// and the projection always equals the full ledger sum. Without the
    /// lock, two concurrent appends could each sum a snapshot missing the
    /// other's uncommitted row and the later commit would write a stale
    /// total.
    pub async fn append(pool: &PgPool, input: &AppendEntry) -> Result<CreditEntry, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(input.user_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO credit_ledger (user_id, amount, entry_type_id, task_id, note) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, CreditEntry>(&query)
            .bind(input.user_id)
            .bind(input.amount)
            .bind(input.entry_type.id())
            .bind(input.task_id)
            .bind(&input.note)
            .fetch_one(&mut *tx)
            .await?;

        // Recompute the projection from the ledger rather than
        // incrementing, so a replayed append cannot drift the balance.
        sqlx::query(
            "UPDATE users SET \
                credits = (SELECT COALESCE(SUM(amount), 0) \
                           FROM credit_ledger WHERE user_id = $1), \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(input.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Current balance, summed straight from the ledger.
    pub async fn balance(pool: &PgPool, user_id: DbId) -> Result<f64, sqlx::Error> {
        sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(amount), 0)::DOUBLE PRECISION \
             FROM credit_ledger WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// A user's entries, newest first.
    pub async fn entries(pool: &PgPool, user_id: DbId) -> Result<Vec<CreditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM credit_ledger \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, CreditEntry>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Entries attributed to a task (spend plus any refunds).
    pub async fn entries_for_task(
        pool: &PgPool,
        task_id: DbId,
    ) -> Result<Vec<CreditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM credit_ledger \
             WHERE task_id = $1 ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, CreditEntry>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }
}
