//! Handlers for the `/auth` resource (register, login, profile, logout).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use nexus_core::error::CoreError;
use nexus_core::roles::Role;
use nexus_core::users::{
    normalize_email, validate_email, validate_password_strength, validate_username,
    MIN_PASSWORD_LENGTH,
};
use nexus_db::models::user::{CreateUser, UpdateUser, User, UserResponse};
use nexus_db::repositories::UserRepository;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, verify_dummy_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Same message for an unknown email and a wrong password.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
///
/// Has no `role` field: unknown keys are ignored, so every registered account
/// is a regular user.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `PUT /auth/me`.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Successful authentication response returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create a regular user account and sign it in. Returns 201 Created.
pub async fn register(
    State(state): State<AppState>,
    AppJson(input): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let username = validate_username(&input.username)?;
    let email = validate_email(&input.email)?;
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .store
        .create_user(&CreateUser {
            username,
            email,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");

    let response = auth_response(&state, &user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password and issue an access token.
pub async fn login(
    State(state): State<AppState>,
    AppJson(input): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&input.email);

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        verify_dummy_password(&input.password);
        tracing::debug!("Login rejected: unknown email");
        return Err(invalid_credentials());
    };

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid_credentials());
    }

    // Deactivation is only reported to callers holding the right password.
    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    state.store.record_login(user.id).await?;
    let user = state.store.find_user_by_id(user.id).await?.unwrap_or(user);

    tracing::info!(user_id = user.id, role = %user.role, "User logged in");

    Ok(Json(auth_response(&state, &user)?))
}

/// GET /api/v1/auth/me
///
/// The caller's own profile.
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = auth.account(&state).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// PUT /api/v1/auth/me
///
/// Update the caller's own username and/or email. Role and active flag are
/// not changeable here.
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(input): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let update = UpdateUser {
        username: input.username.as_deref().map(validate_username).transpose()?,
        email: input.email.as_deref().map(validate_email).transpose()?,
        ..Default::default()
    };

    let user = state
        .store
        .update_user(auth.user_id, &update)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// POST /api/v1/auth/logout
///
/// Tokens are stateless, so this only confirms the caller was authenticated;
/// the client discards its token. Returns 204 No Content.
pub async fn logout(auth: AuthUser) -> StatusCode {
    tracing::info!(user_id = auth.user_id, "User logged out");
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::Unauthorized(INVALID_CREDENTIALS.into()))
}

/// Sign a token for `user` and build the response body.
fn auth_response(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let token = generate_access_token(user.id, user.role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    Ok(AuthResponse {
        token,
        user: UserResponse::from(user),
    })
}
