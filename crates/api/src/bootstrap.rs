//! Startup provisioning of the default administrator account.

use nexus_core::roles::Role;
use nexus_core::users::{
    validate_email, validate_password_strength, validate_username, MIN_PASSWORD_LENGTH,
};
use nexus_db::models::user::{CreateUser, User};
use nexus_db::repositories::{Store, UserRepository};

use crate::auth::password::hash_password;
use crate::config::AdminBootstrap;
use crate::error::{AppError, AppResult};

/// Create the configured administrator unless an account with that email
/// already exists. Existing accounts are never modified.
///
/// Returns the created user, or `None` when nothing was done.
pub async fn ensure_default_admin(
    store: &dyn Store,
    admin: &AdminBootstrap,
) -> AppResult<Option<User>> {
    let email = validate_email(&admin.email)?;
    if store.find_user_by_email(&email).await?.is_some() {
        tracing::debug!(%email, "Default admin already exists");
        return Ok(None);
    }

    let username = validate_username(&admin.username)?;
    validate_password_strength(&admin.password, MIN_PASSWORD_LENGTH)?;
    let password_hash = hash_password(&admin.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = store
        .create_user(&CreateUser {
            username,
            email,
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = user.id, email = %user.email, "Default admin created");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use nexus_db::memory::MemoryStore;

    use super::*;

    fn admin_config() -> AdminBootstrap {
        AdminBootstrap {
            username: "admin".to_string(),
            email: "Admin@Example.com".to_string(),
            password: "changeme".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_admin_once() {
        let store = MemoryStore::new();

        let created = ensure_default_admin(&store, &admin_config())
            .await
            .unwrap()
            .expect("first run creates the admin");
        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.email, "admin@example.com");

        let again = ensure_default_admin(&store, &admin_config()).await.unwrap();
        assert!(again.is_none());
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn existing_account_is_left_untouched() {
        let store = MemoryStore::new();
        store
            .create_user(&CreateUser {
                username: "someone".to_string(),
                email: "admin@example.com".to_string(),
                password_hash: "x".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();

        assert!(ensure_default_admin(&store, &admin_config())
            .await
            .unwrap()
            .is_none());
        let user = store
            .find_user_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, Role::User);
    }
}
