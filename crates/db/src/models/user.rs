//! User entity model (the subset the queue core cares about).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::types::{DbId, Timestamp};

/// A row from the `users` table.
///
/// `credits` is a projection of the credit ledger; it is written only by
/// `CreditRepo` and must never be set directly.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub credits: f64,
    pub allow_pool_workers: bool,
    pub allow_local_workers: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub display_name: Option<String>,
    pub allow_pool_workers: Option<bool>,
    pub allow_local_workers: Option<bool>,
}
