//! Role-based extractors layered over [`AuthUser`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use nexus_core::access::{authorize, Action};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires permission to manage accounts (administrators). Rejects with
/// 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(admin): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        authorize(Some(&user.caller()), Action::ManageUsers)?;
        Ok(RequireAdmin(user))
    }
}
