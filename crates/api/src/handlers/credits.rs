//! Handlers for the credit ledger surface.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use vireo_core::error::CoreError;
use vireo_core::types::DbId;
use vireo_db::models::credit::{AppendCreditRequest, AppendEntry, CreditEntry};
use vireo_db::models::status::CreditEntryType;
use vireo_db::repositories::{CreditRepo, UserRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireService;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /credits`.
#[derive(Debug, Deserialize)]
pub struct CreditQuery {
    /// Service callers must name the user; user callers may omit it.
    pub user_id: Option<DbId>,
}

/// Balance plus full entry history.
#[derive(Debug, Serialize)]
pub struct CreditStatement {
    pub user_id: DbId,
    pub balance: f64,
    pub entries: Vec<CreditEntry>,
}

/// GET /api/v1/credits
///
/// The caller's balance and ledger history. Service callers pass
/// `?user_id=` to inspect any account.
pub async fn get_credits(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CreditQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = match (auth.is_service(), query.user_id) {
        (true, Some(user_id)) => user_id,
        (true, None) => {
            return Err(AppError::Core(CoreError::Validation(
                "user_id query parameter is required for service callers".into(),
            )))
        }
        (false, Some(user_id)) if user_id != auth.user_id => {
            return Err(AppError::Core(CoreError::Forbidden(
                "Cannot view another user's credits".into(),
            )))
        }
        (false, _) => auth.user_id,
    };

    UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }))?;

    let balance = CreditRepo::balance(&state.pool, user_id).await?;
    let entries = CreditRepo::entries(&state.pool, user_id).await?;

    Ok(Json(DataResponse {
        data: CreditStatement {
            user_id,
            balance,
            entries,
        },
    }))
}

/// POST /api/v1/admin/credits
///
/// Append a purchase, refund, or manual adjustment to a user's ledger.
/// Spend entries are produced only by the completion path and are rejected
/// here.
pub async fn append_credit(
    RequireService(_auth): RequireService,
    State(state): State<AppState>,
    Json(input): Json<AppendCreditRequest>,
) -> AppResult<impl IntoResponse> {
    let entry_type = match input.entry_type.as_str() {
        "purchase" => CreditEntryType::Purchase,
        "manual_adjustment" => CreditEntryType::ManualAdjustment,
        "refund" => CreditEntryType::Refund,
        other => {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Unknown credit entry type: {other}"
            ))))
        }
    };
    if !input.amount.is_finite() || input.amount == 0.0 {
        return Err(AppError::Core(CoreError::Validation(
            "amount must be a nonzero finite number".into(),
        )));
    }

    UserRepo::find_by_id(&state.pool, input.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: input.user_id,
        }))?;

    let entry = CreditRepo::append(
        &state.pool,
        &AppendEntry {
            user_id: input.user_id,
            amount: input.amount,
            entry_type,
            task_id: None,
            note: input.note.clone(),
        },
    )
    .await?;

    tracing::info!(
        user_id = input.user_id,
        amount = input.amount,
        entry_type = %input.entry_type,
        "Credit entry appended",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: entry })))
}
