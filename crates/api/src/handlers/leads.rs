//! Handlers for the `/leads` resource.
//!
//! Every handler authenticates via [`AuthUser`] and then asks the access
//! policy ([`authorize`]) before touching the store. Reads and writes of a
//! single lead fetch it first so the policy can see its assignee.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use nexus_core::access::{authorize, ensure_can_reassign, owner_for_new_lead, Action};
use nexus_core::error::CoreError;
use nexus_core::leads::{
    normalize_optional_text, parse_filter, parse_user_note_type, validate_lead_name,
    validate_note_content, LeadSource, LeadStatus,
};
use nexus_core::pagination::{clamp_limit, clamp_offset, MAX_LIST_LIMIT};
use nexus_core::types::{DbId, Timestamp};
use nexus_core::users::validate_email;
use nexus_db::models::lead::{Lead, LeadChanges, LeadFilter, NewLead, NewNote};
use nexus_db::models::stats::DashboardStats;
use nexus_db::repositories::LeadRepository;
use serde::Deserialize;

use super::nullable;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /leads`.
#[derive(Debug, Default, Deserialize)]
pub struct LeadListParams {
    /// Exact status, or `All`.
    pub status: Option<String>,
    /// Exact source, or `All`.
    pub source: Option<String>,
    /// Substring of name, email, or company.
    pub search: Option<String>,
    /// Assignee filter; only honored for administrators.
    pub assigned_to: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for `POST /leads`.
#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    /// Honored for administrators only.
    pub assigned_to: Option<DbId>,
    pub location: Option<String>,
    pub follow_up_date: Option<Timestamp>,
}

/// Request body for `PUT /leads/{id}`. Absent keys are left untouched;
/// `null` clears an optional field.
#[derive(Debug, Deserialize)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub company: Option<Option<String>>,
    pub source: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<DbId>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub follow_up_date: Option<Option<Timestamp>>,
}

/// Request body for `POST /leads/{id}/notes`.
#[derive(Debug, Deserialize)]
pub struct AddNoteRequest {
    #[serde(default)]
    pub content: String,
    /// `call`, `email`, `meeting` or `note` (default).
    #[serde(rename = "type")]
    pub note_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/leads
///
/// List leads visible to the caller, newest first. Without `limit` every
/// matching lead is returned.
pub async fn list_leads(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<LeadListParams>,
) -> AppResult<Json<DataResponse<Vec<Lead>>>> {
    let grant = authorize(Some(&auth.caller()), Action::ListLeads)?;

    let filter = LeadFilter {
        status: parse_filter::<LeadStatus>(params.status.as_deref())?,
        source: parse_filter::<LeadSource>(params.source.as_deref())?,
        search: normalize_optional_text(params.search.as_deref()),
        assigned_to: grant.assignee().or(params.assigned_to),
        limit: clamp_limit(params.limit, MAX_LIST_LIMIT),
        offset: clamp_offset(params.offset),
    };

    let leads = state.store.list_leads(&filter).await?;
    Ok(Json(DataResponse { data: leads }))
}

/// GET /api/v1/leads/dashboard/stats
///
/// Totals, per-status and per-source counts, and the five newest leads,
/// scoped like [`list_leads`].
pub async fn dashboard_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<DashboardStats>>> {
    let grant = authorize(Some(&auth.caller()), Action::ViewLeadStats)?;
    let stats = state.store.lead_dashboard_stats(grant.assignee()).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// POST /api/v1/leads
///
/// Create a lead. Regular users always own what they create; administrators
/// may assign it to any existing user. Returns 201 Created.
pub async fn create_lead(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(input): AppJson<CreateLeadRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Lead>>)> {
    let caller = auth.caller();
    authorize(Some(&caller), Action::CreateLead)?;

    let new_lead = NewLead {
        name: validate_lead_name(&input.name)?,
        email: validate_email(&input.email)?,
        phone: normalize_optional_text(input.phone.as_deref()),
        company: normalize_optional_text(input.company.as_deref()),
        source: parse_or_default(input.source.as_deref())?,
        status: parse_or_default(input.status.as_deref())?,
        assigned_to: Some(owner_for_new_lead(&caller, input.assigned_to)),
        location: normalize_optional_text(input.location.as_deref()),
        follow_up_date: input.follow_up_date,
    };

    let author = auth.note_author(&state).await?;
    let lead = state.store.create_lead(&new_lead, &author).await?;

    tracing::info!(lead_id = lead.id, user_id = auth.user_id, "Lead created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: lead })))
}

/// GET /api/v1/leads/{id}
pub async fn get_lead(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Lead>>> {
    let lead = find_lead(&state, id).await?;
    authorize(
        Some(&auth.caller()),
        Action::ReadLead {
            assigned_to: lead.assigned_to,
        },
    )?;
    Ok(Json(DataResponse { data: lead }))
}

/// PUT /api/v1/leads/{id}
///
/// Partial update. A status change appends a `status` note and refreshes
/// `last_contact`. Only administrators may reassign.
pub async fn update_lead(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateLeadRequest>,
) -> AppResult<Json<DataResponse<Lead>>> {
    let caller = auth.caller();
    let current = find_lead(&state, id).await?;
    authorize(
        Some(&caller),
        Action::UpdateLead {
            assigned_to: current.assigned_to,
        },
    )?;

    if let Some(new_assignee) = input.assigned_to {
        if new_assignee != current.assigned_to {
            ensure_can_reassign(&caller, new_assignee)?;
        }
    }

    let changes = LeadChanges {
        name: input.name.as_deref().map(validate_lead_name).transpose()?,
        email: input.email.as_deref().map(validate_email).transpose()?,
        phone: input.phone.map(|v| normalize_optional_text(v.as_deref())),
        company: input.company.map(|v| normalize_optional_text(v.as_deref())),
        source: input
            .source
            .as_deref()
            .map(str::parse::<LeadSource>)
            .transpose()?,
        status: input
            .status
            .as_deref()
            .map(str::parse::<LeadStatus>)
            .transpose()?,
        assigned_to: input.assigned_to,
        location: input.location.map(|v| normalize_optional_text(v.as_deref())),
        follow_up_date: input.follow_up_date,
    };

    let author = auth.note_author(&state).await?;
    let lead = state
        .store
        .update_lead(id, &changes, &author)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Lead", id }))?;

    tracing::info!(lead_id = id, user_id = auth.user_id, "Lead updated");

    Ok(Json(DataResponse { data: lead }))
}

/// DELETE /api/v1/leads/{id}
///
/// Administrators only. Returns 204 No Content.
pub async fn delete_lead(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    authorize(Some(&auth.caller()), Action::DeleteLead)?;

    if state.store.delete_lead(id).await? {
        tracing::info!(lead_id = id, user_id = auth.user_id, "Lead deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound { entity: "Lead", id }))
    }
}

/// POST /api/v1/leads/{id}/notes
///
/// Append a note and refresh `last_contact`. Returns 201 Created with the
/// updated lead.
pub async fn add_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<AddNoteRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Lead>>)> {
    let current = find_lead(&state, id).await?;
    authorize(
        Some(&auth.caller()),
        Action::AddNote {
            assigned_to: current.assigned_to,
        },
    )?;

    let note = NewNote {
        content: validate_note_content(&input.content)?,
        note_type: parse_user_note_type(input.note_type.as_deref())?,
    };

    let author = auth.note_author(&state).await?;
    let lead = state
        .store
        .add_lead_note(id, &note, &author)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Lead", id }))?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: lead })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_lead(state: &AppState, id: DbId) -> AppResult<Lead> {
    state
        .store
        .find_lead(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Lead", id }))
}

/// Parse an optional enumeration value; absent or blank yields the default.
fn parse_or_default<T>(raw: Option<&str>) -> Result<T, CoreError>
where
    T: std::str::FromStr<Err = CoreError> + Default,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(value) => value.parse(),
    }
}
