//! In-memory [`Store`], used when no `DATABASE_URL` is configured and by the
//! HTTP and client test suites.
//!
//! All state sits behind one async mutex. Every operation holds it for the
//! whole read-modify-write, which gives the same per-lead serialization the
//! PostgreSQL store gets from row locks, and makes user deletion plus lead
//! reassignment atomic. The unique and foreign-key constraints of the SQL
//! schema are enforced by hand.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use nexus_core::error::{CoreError, CoreResult};
use nexus_core::leads::RECENT_LEADS_LIMIT;
use nexus_core::types::DbId;
use tokio::sync::Mutex;

use crate::models::lead::{Lead, LeadChanges, LeadFilter, NewLead, NewNote, NoteAuthor};
use crate::models::stats::{
    sort_source_counts, DashboardStats, OwnerLeadCounts, RecentLead, SourceCount, StatusCounts,
};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::repositories::{LeadRepository, Store, UserRepository};

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<DbId, User>,
    leads: BTreeMap<DbId, Lead>,
    next_user_id: DbId,
    next_lead_id: DbId,
}

impl State {
    fn ensure_unique_user(&self, id: Option<DbId>, username: &str, email: &str) -> CoreResult<()> {
        for user in self.users.values().filter(|u| Some(u.id) != id) {
            if user.username == username {
                return Err(CoreError::Conflict("Username already exists".to_string()));
            }
            if user.email == email {
                return Err(CoreError::Conflict("Email already exists".to_string()));
            }
        }
        Ok(())
    }

    fn ensure_unique_lead_email(&self, id: Option<DbId>, email: &str) -> CoreResult<()> {
        if self
            .leads
            .values()
            .any(|l| Some(l.id) != id && l.email == email)
        {
            return Err(CoreError::Conflict(
                "Lead with this email already exists".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_assignee_exists(&self, assigned_to: Option<DbId>) -> CoreResult<()> {
        match assigned_to {
            Some(id) if !self.users.contains_key(&id) => Err(CoreError::Validation(
                "Assigned user does not exist".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn visible_leads(&self, assigned_to: Option<DbId>) -> impl Iterator<Item = &Lead> {
        self.leads
            .values()
            .filter(move |l| assigned_to.is_none() || l.assigned_to == assigned_to)
    }
}

/// Newest created first, ties broken by id descending.
fn newest_first(a: &Lead, b: &Lead) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

/// Process-local store with the same semantics as the PostgreSQL one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, input: &CreateUser) -> CoreResult<User> {
        let mut state = self.state.lock().await;
        state.ensure_unique_user(None, &input.username, &input.email)?;

        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: state.next_user_id,
            username: input.username.clone(),
            email: input.email.clone(),
            password_hash: input.password_hash.clone(),
            role: input.role,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: DbId) -> CoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn update_user(&self, id: DbId, input: &UpdateUser) -> CoreResult<Option<User>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.users.get(&id) else {
            return Ok(None);
        };
        let username = input.username.clone().unwrap_or_else(|| current.username.clone());
        let email = input.email.clone().unwrap_or_else(|| current.email.clone());
        state.ensure_unique_user(Some(id), &username, &email)?;

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        user.username = username;
        user.email = email;
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> CoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_login(&self, id: DbId) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete_user(&self, id: DbId, reassign_to: DbId) -> CoreResult<bool> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&id) {
            return Ok(false);
        }
        state.ensure_assignee_exists(Some(reassign_to))?;

        for lead in state.leads.values_mut() {
            if lead.assigned_to == Some(id) {
                lead.assigned_to = Some(reassign_to);
            }
        }
        state.users.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl LeadRepository for MemoryStore {
    async fn list_leads(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>> {
        let state = self.state.lock().await;
        let mut leads: Vec<&Lead> = state.leads.values().filter(|l| filter.matches(l)).collect();
        leads.sort_by(|a, b| newest_first(a, b));

        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = filter
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(0));
        Ok(leads
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_lead(&self, id: DbId) -> CoreResult<Option<Lead>> {
        Ok(self.state.lock().await.leads.get(&id).cloned())
    }

    async fn create_lead(&self, input: &NewLead, author: &NoteAuthor) -> CoreResult<Lead> {
        let mut state = self.state.lock().await;
        state.ensure_unique_lead_email(None, &input.email)?;
        state.ensure_assignee_exists(input.assigned_to)?;

        state.next_lead_id += 1;
        let now = Utc::now();
        let lead = Lead {
            id: state.next_lead_id,
            name: input.name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            company: input.company.clone(),
            source: input.source,
            status: input.status,
            assigned_to: input.assigned_to,
            location: input.location.clone(),
            last_contact: now,
            follow_up_date: input.follow_up_date,
            notes: NewLead::initial_notes(author, now),
            created_at: now,
            updated_at: now,
        };
        state.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn update_lead(
        &self,
        id: DbId,
        changes: &LeadChanges,
        author: &NoteAuthor,
    ) -> CoreResult<Option<Lead>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.leads.get(&id) else {
            return Ok(None);
        };

        let mut lead = current.clone();
        lead.apply_changes(changes, author, Utc::now());
        state.ensure_unique_lead_email(Some(id), &lead.email)?;
        state.ensure_assignee_exists(lead.assigned_to)?;

        state.leads.insert(id, lead.clone());
        Ok(Some(lead))
    }

    async fn add_lead_note(
        &self,
        id: DbId,
        note: &NewNote,
        author: &NoteAuthor,
    ) -> CoreResult<Option<Lead>> {
        let mut state = self.state.lock().await;
        let Some(lead) = state.leads.get_mut(&id) else {
            return Ok(None);
        };
        lead.append_note(note, author, Utc::now());
        Ok(Some(lead.clone()))
    }

    async fn delete_lead(&self, id: DbId) -> CoreResult<bool> {
        Ok(self.state.lock().await.leads.remove(&id).is_some())
    }

    async fn lead_dashboard_stats(&self, assigned_to: Option<DbId>) -> CoreResult<DashboardStats> {
        let state = self.state.lock().await;

        let mut by_status = StatusCounts::default();
        let mut source_counts = BTreeMap::new();
        for lead in state.visible_leads(assigned_to) {
            by_status.add(lead.status, 1);
            *source_counts.entry(lead.source).or_insert(0_i64) += 1;
        }

        let mut sources: Vec<SourceCount> = source_counts
            .into_iter()
            .map(|(source, count)| SourceCount { source, count })
            .collect();
        sort_source_counts(&mut sources);

        let mut visible: Vec<&Lead> = state.visible_leads(assigned_to).collect();
        visible.sort_by(|a, b| newest_first(a, b));
        let recent = visible
            .into_iter()
            .take(RECENT_LEADS_LIMIT)
            .map(|l| RecentLead {
                id: l.id,
                name: l.name.clone(),
                email: l.email.clone(),
                status: l.status,
                source: l.source,
                created_at: l.created_at,
            })
            .collect();

        Ok(DashboardStats {
            total: by_status.total(),
            by_status,
            sources,
            recent,
        })
    }

    async fn lead_counts_by_owner(&self) -> CoreResult<Vec<OwnerLeadCounts>> {
        let state = self.state.lock().await;
        let mut owners: BTreeMap<DbId, StatusCounts> = BTreeMap::new();
        for lead in state.leads.values() {
            if let Some(owner) = lead.assigned_to {
                owners.entry(owner).or_default().add(lead.status, 1);
            }
        }
        Ok(owners
            .into_iter()
            .map(|(owner, counts)| OwnerLeadCounts { owner, counts })
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use nexus_core::leads::{LeadSource, LeadStatus, NoteType};
    use nexus_core::roles::Role;

    use super::*;

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(&CreateUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap()
    }

    fn new_lead(email: &str, assigned_to: Option<DbId>) -> NewLead {
        NewLead {
            name: "Grace Hopper".to_string(),
            email: email.to_string(),
            phone: None,
            company: Some("Navy".to_string()),
            source: LeadSource::Website,
            status: LeadStatus::New,
            assigned_to,
            location: None,
            follow_up_date: None,
        }
    }

    #[tokio::test]
    async fn duplicate_user_email_conflicts() {
        let store = MemoryStore::new();
        user(&store, "alice").await;
        let err = store
            .create_user(&CreateUser {
                username: "alice2".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(msg) if msg == "Email already exists");
    }

    #[tokio::test]
    async fn created_lead_starts_with_created_note() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let lead = store
            .create_lead(
                &new_lead("grace@navy.mil", Some(alice.id)),
                &NoteAuthor::user(alice.id, "alice"),
            )
            .await
            .unwrap();
        assert_eq!(lead.notes.len(), 1);
        assert_eq!(lead.notes[0].note_type, NoteType::Created);
        assert_eq!(lead.last_contact, lead.created_at);
    }

    #[tokio::test]
    async fn duplicate_lead_email_conflicts() {
        let store = MemoryStore::new();
        store
            .create_lead(&new_lead("grace@navy.mil", None), &NoteAuthor::system())
            .await
            .unwrap();
        let err = store
            .create_lead(&new_lead("grace@navy.mil", None), &NoteAuthor::system())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn unknown_assignee_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .create_lead(&new_lead("grace@navy.mil", Some(42)), &NoteAuthor::system())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .create_lead(&new_lead(&format!("l{i}@x.io"), None), &NoteAuthor::system())
                .await
                .unwrap();
        }
        let all = store.list_leads(&LeadFilter::default()).await.unwrap();
        let ids: Vec<DbId> = all.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let page = store
            .list_leads(&LeadFilter {
                limit: Some(1),
                offset: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, 2);
    }

    #[tokio::test]
    async fn delete_user_reassigns_leads() {
        let store = MemoryStore::new();
        let admin = user(&store, "root").await;
        let alice = user(&store, "alice").await;
        let lead = store
            .create_lead(&new_lead("grace@navy.mil", Some(alice.id)), &NoteAuthor::system())
            .await
            .unwrap();

        assert!(store.delete_user(alice.id, admin.id).await.unwrap());
        assert!(store.find_user_by_id(alice.id).await.unwrap().is_none());
        let lead = store.find_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(lead.assigned_to, Some(admin.id));

        assert!(!store.delete_user(alice.id, admin.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_user_moves_only_their_leads() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        for email in ["a@x.io", "b@x.io"] {
            store
                .create_lead(&new_lead(email, Some(alice.id)), &NoteAuthor::system())
                .await
                .unwrap();
        }
        let unassigned = store
            .create_lead(&new_lead("c@x.io", None), &NoteAuthor::system())
            .await
            .unwrap();

        assert!(store.delete_user(alice.id, bob.id).await.unwrap());
        let lead = store.find_lead(unassigned.id).await.unwrap().unwrap();
        assert_eq!(lead.assigned_to, None);

        let owners = store.lead_counts_by_owner().await.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].owner, bob.id);
        assert_eq!(owners[0].counts.total(), 2);
    }

    #[tokio::test]
    async fn concurrent_notes_are_all_kept() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let lead = store
            .create_lead(&new_lead("grace@navy.mil", None), &NoteAuthor::system())
            .await
            .unwrap();
        let lead_id = lead.id;

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_lead_note(
                        lead_id,
                        &NewNote {
                            content: format!("note {i}"),
                            note_type: NoteType::Call,
                        },
                        &NoteAuthor::system(),
                    )
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let lead = store.find_lead(lead_id).await.unwrap().unwrap();
        assert_eq!(lead.notes.len(), 11);
    }

    #[tokio::test]
    async fn concurrent_status_changes_keep_a_consistent_history() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let lead = store
            .create_lead(&new_lead("grace@navy.mil", None), &NoteAuthor::system())
            .await
            .unwrap();
        let lead_id = lead.id;

        let targets = [
            LeadStatus::Contacted,
            LeadStatus::Converted,
            LeadStatus::Lost,
            LeadStatus::New,
        ];
        let mut handles = Vec::new();
        for i in 0..12 {
            let store = store.clone();
            let target = targets[i % targets.len()];
            handles.push(tokio::spawn(async move {
                let changes = LeadChanges {
                    status: Some(target),
                    ..Default::default()
                };
                let updated = store
                    .update_lead(lead_id, &changes, &NoteAuthor::system())
                    .await
                    .unwrap()
                    .unwrap();
                (target, updated)
            }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        let lead = store.find_lead(lead_id).await.unwrap().unwrap();
        for (target, updated) in &results {
            assert_eq!(updated.status, *target);
            assert!(lead.notes.starts_with(&updated.notes));
        }

        let mut current = LeadStatus::New;
        for note in lead.notes.iter().filter(|n| n.note_type == NoteType::Status) {
            let (from, to) = note
                .content
                .strip_prefix("Status changed from ")
                .and_then(|rest| rest.split_once(" to "))
                .unwrap();
            let from: LeadStatus = from.parse().unwrap();
            let to: LeadStatus = to.parse().unwrap();
            assert_eq!(from, current);
            assert_ne!(from, to);
            current = to;
        }
        assert_eq!(current, lead.status);
    }

    #[tokio::test]
    async fn dashboard_stats_are_scoped() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        store
            .create_lead(&new_lead("a@x.io", Some(alice.id)), &NoteAuthor::system())
            .await
            .unwrap();
        let mut converted = new_lead("b@x.io", Some(bob.id));
        converted.status = LeadStatus::Converted;
        converted.source = LeadSource::Referral;
        store
            .create_lead(&converted, &NoteAuthor::system())
            .await
            .unwrap();

        let all = store.lead_dashboard_stats(None).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.by_status.converted, 1);
        assert_eq!(all.recent.len(), 2);

        let mine = store.lead_dashboard_stats(Some(alice.id)).await.unwrap();
        assert_eq!(mine.total, 1);
        assert_eq!(mine.by_status.new, 1);
        assert_eq!(mine.sources.len(), 1);
        assert_eq!(mine.sources[0].source, LeadSource::Website);

        let owners = store.lead_counts_by_owner().await.unwrap();
        assert_eq!(owners.len(), 2);
    }
}
