//! Lead entity model, its embedded note history, and DTOs.
//!
//! The lifecycle rules (audit note on status change, `last_contact` refresh)
//! live on [`Lead`] itself so both store backends apply them identically.

use nexus_core::leads::{
    contains_ignore_case, status_change_note, LeadSource, LeadStatus, NoteType,
    LEAD_CREATED_NOTE, SYSTEM_AUTHOR,
};
use nexus_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full lead row from the `leads` table, notes included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[sqlx(try_from = "String")]
    pub source: LeadSource,
    #[sqlx(try_from = "String")]
    pub status: LeadStatus,
    pub assigned_to: Option<DbId>,
    pub location: Option<String>,
    pub last_contact: Timestamp,
    pub follow_up_date: Option<Timestamp>,
    /// Creation order: oldest first.
    #[sqlx(json)]
    pub notes: Vec<Note>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An immutable entry in a lead's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    /// Author's user id; `None` for system-generated entries.
    pub created_by: Option<DbId>,
    /// Author's display name at the time the note was written.
    pub author: String,
    pub created_at: Timestamp,
}

/// Who is writing a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteAuthor {
    pub user_id: Option<DbId>,
    pub name: String,
}

impl NoteAuthor {
    pub fn user(user_id: DbId, name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            name: name.into(),
        }
    }

    pub fn system() -> Self {
        Self {
            user_id: None,
            name: SYSTEM_AUTHOR.to_string(),
        }
    }
}

impl Note {
    pub fn new(
        content: impl Into<String>,
        note_type: NoteType,
        author: &NoteAuthor,
        now: Timestamp,
    ) -> Self {
        Self {
            content: content.into(),
            note_type,
            created_by: author.user_id,
            author: author.name.clone(),
            created_at: now,
        }
    }
}

/// DTO for creating a lead. Fields are already validated and normalized.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub assigned_to: Option<DbId>,
    pub location: Option<String>,
    pub follow_up_date: Option<Timestamp>,
}

impl NewLead {
    /// The history a freshly created lead starts with.
    pub fn initial_notes(author: &NoteAuthor, now: Timestamp) -> Vec<Note> {
        vec![Note::new(LEAD_CREATED_NOTE, NoteType::Created, author, now)]
    }
}

/// DTO for a partial lead update.
///
/// `None` leaves a field untouched; for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct LeadChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    pub assigned_to: Option<Option<DbId>>,
    pub location: Option<Option<String>>,
    pub follow_up_date: Option<Option<Timestamp>>,
}

/// DTO for a user-submitted note.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub content: String,
    pub note_type: NoteType,
}

impl Lead {
    /// Apply a partial update.
    ///
    /// A status change is recorded first: an audit note with the before and
    /// after values is appended and `last_contact` moves to `now`. The rest of
    /// the changes are applied afterwards. Returns whether the status changed.
    pub fn apply_changes(
        &mut self,
        changes: &LeadChanges,
        author: &NoteAuthor,
        now: Timestamp,
    ) -> bool {
        let mut status_changed = false;
        if let Some(status) = changes.status {
            if status != self.status {
                self.notes.push(Note::new(
                    status_change_note(self.status, status),
                    NoteType::Status,
                    author,
                    now,
                ));
                self.status = status;
                self.last_contact = now;
                status_changed = true;
            }
        }

        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(email) = &changes.email {
            self.email = email.clone();
        }
        if let Some(phone) = &changes.phone {
            self.phone = phone.clone();
        }
        if let Some(company) = &changes.company {
            self.company = company.clone();
        }
        if let Some(source) = changes.source {
            self.source = source;
        }
        if let Some(assigned_to) = changes.assigned_to {
            self.assigned_to = assigned_to;
        }
        if let Some(location) = &changes.location {
            self.location = location.clone();
        }
        if let Some(follow_up_date) = changes.follow_up_date {
            self.follow_up_date = follow_up_date;
        }

        self.updated_at = now;
        status_changed
    }

    /// Append a user-submitted note and refresh `last_contact`.
    pub fn append_note(&mut self, note: &NewNote, author: &NoteAuthor, now: Timestamp) {
        self.notes
            .push(Note::new(note.content.clone(), note.note_type, author, now));
        self.last_contact = now;
        self.updated_at = now;
    }
}

/// Filter for listing leads.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    /// Case-insensitive substring over name, email, or company.
    pub search: Option<String>,
    pub assigned_to: Option<DbId>,
    /// `None` returns every matching lead.
    pub limit: Option<i64>,
    pub offset: i64,
}

impl LeadFilter {
    /// Whether `lead` satisfies every predicate of this filter (pagination aside).
    pub fn matches(&self, lead: &Lead) -> bool {
        if self.status.is_some_and(|s| s != lead.status) {
            return false;
        }
        if self.source.is_some_and(|s| s != lead.source) {
            return false;
        }
        if let Some(owner) = self.assigned_to {
            if lead.assigned_to != Some(owner) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let hit = contains_ignore_case(&lead.name, term)
                || contains_ignore_case(&lead.email, term)
                || lead
                    .company
                    .as_deref()
                    .is_some_and(|c| contains_ignore_case(c, term));
            if !hit {
                return false;
            }
        }
        true
    }
}
