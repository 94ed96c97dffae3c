//! PostgreSQL implementation of [`UserRepository`] over the `users` table.

use async_trait::async_trait;
use nexus_core::error::CoreResult;
use nexus_core::types::DbId;

use super::{PgStore, UserRepository};
use crate::error::db_error;
use crate::models::user::{CreateUser, UpdateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, password_hash, role, is_active, \
                        last_login_at, created_at, updated_at";

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, input: &CreateUser) -> CoreResult<User> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(input.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn find_user_by_id(&self, id: DbId) -> CoreResult<Option<User>> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        let query = format!("SELECT {COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn update_user(&self, id: DbId, input: &UpdateUser) -> CoreResult<Option<User>> {
        let query = format!(
            "UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&input.username)
            .bind(&input.email)
            .bind(input.role.map(|r| r.as_str()))
            .bind(input.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> CoreResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: DbId) -> CoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_user(&self, id: DbId, reassign_to: DbId) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let moved = sqlx::query("UPDATE leads SET assigned_to = $2 WHERE assigned_to = $1")
            .bind(id)
            .bind(reassign_to)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back the reassignment.
            return Ok(false);
        }

        tx.commit().await.map_err(db_error)?;
        tracing::info!(user_id = id, reassign_to, moved, "Deleted user and reassigned leads");
        Ok(true)
    }
}
