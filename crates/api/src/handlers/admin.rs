//! Handlers for the `/admin` resource (user management).
//!
//! All handlers require an administrator via [`RequireAdmin`].

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use nexus_core::access::{authorize, Action};
use nexus_core::error::CoreError;
use nexus_core::leads::conversion_rate;
use nexus_core::roles::Role;
use nexus_core::types::DbId;
use nexus_core::users::{
    validate_email, validate_password_strength, validate_username, MIN_PASSWORD_LENGTH,
};
use nexus_db::models::stats::StatusCounts;
use nexus_db::models::user::{CreateUser, UpdateUser, User, UserLeadStats, UserResponse};
use nexus_db::repositories::{LeadRepository, UserRepository};
use serde::Deserialize;

use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /admin/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// `user` (default) or `admin`.
    pub role: Option<String>,
}

/// Request body for `PUT /admin/users/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

/// Request body for `POST /admin/users/{id}/reset-password`.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default, alias = "password")]
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/users
///
/// All users, newest first.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = state.store.list_users().await?;
    Ok(Json(DataResponse {
        data: users.iter().map(UserResponse::from).collect(),
    }))
}

/// POST /api/v1/admin/users
///
/// Create a user with an explicit role. Returns 201 Created.
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppJson(input): AppJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let username = validate_username(&input.username)?;
    let email = validate_email(&input.email)?;
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)?;
    let role = parse_role(input.role.as_deref())?.unwrap_or_default();

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .store
        .create_user(&CreateUser {
            username,
            email,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, admin_id = admin.user_id, "User created by admin");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// GET /api/v1/admin/users/stats
///
/// Lead performance for every regular user account.
pub async fn user_stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<UserLeadStats>>>> {
    let users = state.store.list_users().await?;
    let counts: HashMap<DbId, StatusCounts> = state
        .store
        .lead_counts_by_owner()
        .await?
        .into_iter()
        .map(|c| (c.owner, c.counts))
        .collect();

    let stats = users
        .iter()
        .filter(|u| u.role == Role::User)
        .map(|u| {
            let by_status = counts.get(&u.id).copied().unwrap_or_default();
            let total_leads = by_status.total();
            UserLeadStats {
                user_id: u.id,
                username: u.username.clone(),
                email: u.email.clone(),
                total_leads,
                by_status,
                conversion_rate: conversion_rate(by_status.converted, total_leads),
                last_login_at: u.last_login_at,
                is_active: u.is_active,
            }
        })
        .collect();

    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = find_user(&state, id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// PUT /api/v1/admin/users/{id}
///
/// Update username, email, role, or active flag (not password).
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let update = UpdateUser {
        username: input.username.as_deref().map(validate_username).transpose()?,
        email: input.email.as_deref().map(validate_email).transpose()?,
        role: parse_role(input.role.as_deref())?,
        is_active: input.is_active,
    };

    let user = state
        .store
        .update_user(id, &update)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;

    tracing::info!(user_id = id, admin_id = admin.user_id, "User updated by admin");

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// DELETE /api/v1/admin/users/{id}
///
/// Delete a user, reassigning their leads to the acting administrator.
/// Administrators cannot delete themselves. Returns 204 No Content.
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    authorize(Some(&admin.caller()), Action::DeleteUser { target: id })?;

    if state.store.delete_user(id, admin.user_id).await? {
        tracing::info!(user_id = id, admin_id = admin.user_id, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound { entity: "User", id }))
    }
}

/// POST /api/v1/admin/users/{id}/reset-password
///
/// Set a new password for a user. Returns 204 No Content.
pub async fn reset_password(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    validate_password_strength(&input.new_password, MIN_PASSWORD_LENGTH)?;

    let hashed = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    if state.store.update_password(id, &hashed).await? {
        tracing::info!(user_id = id, admin_id = admin.user_id, "Password reset by admin");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound { entity: "User", id }))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_user(state: &AppState, id: DbId) -> AppResult<User> {
    state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
}

/// Parse an optional role name; blank counts as absent.
fn parse_role(raw: Option<&str>) -> Result<Option<Role>, CoreError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}
