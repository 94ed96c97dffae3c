//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use nexus_core::access::Caller;
use nexus_core::error::CoreError;
use nexus_core::roles::Role;
use nexus_core::types::DbId;
use nexus_db::models::lead::NoteAuthor;
use nexus_db::models::user::User;
use nexus_db::repositories::UserRepository;

use crate::auth::jwt::verify;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Authenticated caller extracted from a JWT Bearer token in the `Authorization` header.
///
/// Rejects with 401 when the header is missing, malformed, or carries an
/// invalid or expired token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    pub role: Role,
}

impl AuthUser {
    /// The identity the access policy reasons about.
    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id, self.role)
    }

    /// Load the caller's account. A token whose account has since been
    /// deleted is rejected as `Unauthorized`.
    pub async fn account(&self, state: &AppState) -> AppResult<User> {
        state
            .store
            .find_user_by_id(self.user_id)
            .await?
            .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))
    }

    /// Note authorship for writes made by this caller.
    pub async fn note_author(&self, state: &AppState) -> AppResult<NoteAuthor> {
        let account = self.account(state).await?;
        Ok(NoteAuthor::user(account.id, account.username))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let (user_id, role) = verify(token, &state.config.jwt)?;

        Ok(AuthUser { user_id, role })
    }
}
