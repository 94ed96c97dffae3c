//! Client-side session: the signed-in user and their bearer token.
//!
//! A [`Session`] is the single source of truth for "who is signed in" on the
//! presentation side. It is cheap to clone; clones share the same state, so a
//! sign-out or a `401` seen by one holder is seen by all.

use std::sync::Arc;

use nexus_core::roles::Role;
use nexus_db::models::user::UserResponse;
use tokio::sync::RwLock;

/// Token and profile of the signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub token: String,
    pub user: UserResponse,
}

/// Shared, invalidatable session state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<Option<SessionData>>>,
}

impl Session {
    /// An empty (signed-out) session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session with a freshly issued token.
    pub async fn sign_in(&self, token: String, user: UserResponse) {
        tracing::debug!(user_id = user.id, "Session started");
        *self.inner.write().await = Some(SessionData { token, user });
    }

    /// Drop the token and profile. Idempotent.
    pub async fn invalidate(&self) {
        if self.inner.write().await.take().is_some() {
            tracing::debug!("Session invalidated");
        }
    }

    /// Refresh the cached profile, keeping the token. No-op when signed out.
    pub async fn update_user(&self, user: UserResponse) {
        if let Some(data) = self.inner.write().await.as_mut() {
            data.user = user;
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|d| d.token.clone())
    }

    pub async fn user(&self) -> Option<UserResponse> {
        self.inner.read().await.as_ref().map(|d| d.user.clone())
    }

    pub async fn is_signed_in(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Whether the signed-in user is an administrator. `false` when signed out.
    ///
    /// Only decides what to show; the server enforces access on every call.
    pub async fn is_admin(&self) -> bool {
        self.inner
            .read()
            .await
            .as_ref()
            .is_some_and(|d| d.user.role == Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn profile(role: Role) -> UserResponse {
        UserResponse {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn starts_signed_out() {
        let session = Session::new();
        assert!(!session.is_signed_in().await);
        assert!(!session.is_admin().await);
        assert_eq!(session.token().await, None);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let session = Session::new();
        let view = session.clone();

        session.sign_in("tok".to_string(), profile(Role::Admin)).await;
        assert_eq!(view.token().await.as_deref(), Some("tok"));
        assert!(view.is_admin().await);

        view.invalidate().await;
        assert!(!session.is_signed_in().await);
        assert_eq!(session.user().await, None);
    }

    #[tokio::test]
    async fn update_user_keeps_token() {
        let session = Session::new();
        session.update_user(profile(Role::User)).await;
        assert!(!session.is_signed_in().await);

        session.sign_in("tok".to_string(), profile(Role::User)).await;
        let mut renamed = profile(Role::User);
        renamed.username = "alice2".to_string();
        session.update_user(renamed).await;

        assert_eq!(session.user().await.unwrap().username, "alice2");
        assert_eq!(session.token().await.as_deref(), Some("tok"));
    }
}
