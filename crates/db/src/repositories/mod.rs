//! Store traits and the PostgreSQL implementation.
//!
//! Handlers depend on `dyn Store` so the same request layer runs against
//! PostgreSQL ([`PgStore`]) or the in-memory store ([`crate::memory::MemoryStore`]).
//! Every method returns [`CoreResult`]; backend failures are already
//! classified (see [`crate::error::db_error`]).

mod lead_repo;
mod user_repo;

use async_trait::async_trait;
use nexus_core::error::CoreResult;
use nexus_core::types::DbId;

use crate::models::lead::{Lead, LeadChanges, LeadFilter, NewLead, NewNote, NoteAuthor};
use crate::models::stats::{DashboardStats, OwnerLeadCounts};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::DbPool;

/// Credential store: user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. `Conflict` when the username or email is taken.
    async fn create_user(&self, input: &CreateUser) -> CoreResult<User>;

    async fn find_user_by_id(&self, id: DbId) -> CoreResult<Option<User>>;

    /// Lookup by normalized (lowercase) email.
    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>>;

    /// All users, newest first.
    async fn list_users(&self) -> CoreResult<Vec<User>>;

    /// Apply the non-`None` fields of `input`. `None` when the user is absent.
    async fn update_user(&self, id: DbId, input: &UpdateUser) -> CoreResult<Option<User>>;

    /// Replace the stored password hash. Returns `false` when the user is absent.
    async fn update_password(&self, id: DbId, password_hash: &str) -> CoreResult<bool>;

    /// Stamp `last_login_at` with the current time.
    async fn record_login(&self, id: DbId) -> CoreResult<()>;

    /// Reassign the user's leads to `reassign_to` and delete the user, atomically.
    ///
    /// Returns `false` (and changes nothing) when the user is absent.
    async fn delete_user(&self, id: DbId, reassign_to: DbId) -> CoreResult<bool>;
}

/// Lead store: leads and their embedded note history.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Leads matching `filter`, newest created first.
    async fn list_leads(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>>;

    async fn find_lead(&self, id: DbId) -> CoreResult<Option<Lead>>;

    /// Insert a lead with its initial `created` note.
    async fn create_lead(&self, input: &NewLead, author: &NoteAuthor) -> CoreResult<Lead>;

    /// Apply a partial update under a per-lead lock. `None` when absent.
    async fn update_lead(
        &self,
        id: DbId,
        changes: &LeadChanges,
        author: &NoteAuthor,
    ) -> CoreResult<Option<Lead>>;

    /// Append a note under a per-lead lock. `None` when absent.
    async fn add_lead_note(
        &self,
        id: DbId,
        note: &NewNote,
        author: &NoteAuthor,
    ) -> CoreResult<Option<Lead>>;

    /// Returns `true` if a row was deleted.
    async fn delete_lead(&self, id: DbId) -> CoreResult<bool>;

    /// Dashboard summary, optionally restricted to one assignee.
    async fn lead_dashboard_stats(&self, assigned_to: Option<DbId>) -> CoreResult<DashboardStats>;

    /// Per-assignee status counts. Unassigned leads are not included.
    async fn lead_counts_by_owner(&self) -> CoreResult<Vec<OwnerLeadCounts>>;
}

/// A complete persistence backend.
#[async_trait]
pub trait Store: UserRepository + LeadRepository {
    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> CoreResult<()>;
}

/// PostgreSQL-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> CoreResult<()> {
        crate::health_check(&self.pool)
            .await
            .map_err(crate::error::db_error)
    }
}
