pub mod admin;
pub mod auth;
pub mod health;
pub mod leads;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                          register (public)
/// /auth/login                             login (public)
/// /auth/me                                profile, update profile
/// /auth/logout                            logout
///
/// /leads                                  list, create
/// /leads/dashboard/stats                  dashboard stats
/// /leads/{id}                             get, update, delete (admin)
/// /leads/{id}/notes                       add note
///
/// /admin/users                            list, create (admin only)
/// /admin/users/stats                      per-user lead stats
/// /admin/users/{id}                       get, update, delete
/// /admin/users/{id}/reset-password        reset password
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/leads", leads::router())
        .nest("/admin", admin::router())
}
