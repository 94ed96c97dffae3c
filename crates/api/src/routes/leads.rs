//! Route definitions for the `/leads` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::leads;
use crate::state::AppState;

/// Routes mounted at `/leads`. All require authentication.
///
/// ```text
/// GET    /                 -> list_leads
/// POST   /                 -> create_lead
/// GET    /dashboard/stats  -> dashboard_stats
/// GET    /{id}             -> get_lead
/// PUT    /{id}             -> update_lead
/// DELETE /{id}             -> delete_lead (admin)
/// POST   /{id}/notes       -> add_note
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(leads::list_leads).post(leads::create_lead))
        .route("/dashboard/stats", get(leads::dashboard_stats))
        .route(
            "/{id}",
            get(leads::get_lead)
                .put(leads::update_lead)
                .delete(leads::delete_lead),
        )
        .route("/{id}/notes", post(leads::add_note))
}
