//! Credit ledger entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vireo_core::types::{DbId, Timestamp};

use super::status::{CreditEntryType, StatusId};

/// A row from the append-only `credit_ledger` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditEntry {
    pub id: DbId,
    pub user_id: DbId,
    /// Signed: spends are negative, purchases/refunds positive.
    pub amount: f64,
    pub entry_type_id: StatusId,
    pub task_id: Option<DbId>,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct AppendEntry {
    pub user_id: DbId,
    pub amount: f64,
    pub entry_type: CreditEntryType,
    pub task_id: Option<DbId>,
    pub note: Option<String>,
}

/// Request body for the admin credit-append endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AppendCreditRequest {
    pub user_id: DbId,
    pub amount: f64,
    /// `"purchase"`, `"manual_adjustment"`, or `"refund"`.
    pub entry_type: String,
    pub note: Option<String>,
}
