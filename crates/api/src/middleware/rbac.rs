//! Role-based access control extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! meet the minimum requirement. Use these in route handlers to enforce
//! authorization at the type level.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use vireo_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `service` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn service_only(RequireService(auth): RequireService) -> AppResult<Json<()>> {
///     // auth is guaranteed to be a service credential here
///     Ok(Json(()))
/// }
/// ```
pub struct RequireService(pub AuthUser);

impl FromRequestParts<AppState> for RequireService {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.is_service() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Service credential required".into(),
            )));
        }
        Ok(RequireService(auth))
    }
}
