//! Integration tests for the PostgreSQL store.
//!
//! These need a live database (`DATABASE_URL`) and are ignored by default:
//! `cargo test -p nexus-db -- --ignored`.

use assert_matches::assert_matches;
use nexus_core::error::CoreError;
use nexus_core::leads::{LeadSource, LeadStatus, NoteType};
use nexus_core::roles::Role;
use nexus_db::models::lead::{LeadChanges, LeadFilter, NewLead, NewNote, NoteAuthor};
use nexus_db::models::user::{CreateUser, UpdateUser, User};
use nexus_db::repositories::{LeadRepository, PgStore, Store, UserRepository};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(store: &PgStore, name: &str, role: Role) -> User {
    store
        .create_user(&CreateUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "$argon2id$stub".to_string(),
            role,
        })
        .await
        .unwrap()
}

fn new_lead(name: &str, email: &str, assigned_to: Option<i64>) -> NewLead {
    NewLead {
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        company: Some("Acme 100% Widgets".to_string()),
        source: LeadSource::Website,
        status: LeadStatus::New,
        assigned_to,
        location: None,
        follow_up_date: None,
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn user_crud_and_unique_constraints(pool: PgPool) {
    let store = PgStore::new(pool);
    store.health_check().await.unwrap();

    let alice = seed_user(&store, "alice", Role::User).await;
    assert_eq!(alice.role, Role::User);
    assert!(alice.is_active);

    let dup = store
        .create_user(&CreateUser {
            username: "alice".to_string(),
            email: "other@example.com".to_string(),
            password_hash: "x".to_string(),
            role: Role::User,
        })
        .await;
    assert_matches!(dup, Err(CoreError::Conflict(msg)) if msg == "Username already exists");

    let updated = store
        .update_user(
            alice.id,
            &UpdateUser {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.role, Role::Admin);
    assert_eq!(updated.username, "alice");

    let found = store
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, alice.id);

    store.record_login(alice.id).await.unwrap();
    let found = store.find_user_by_id(alice.id).await.unwrap().unwrap();
    assert!(found.last_login_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn deleting_user_reassigns_leads(pool: PgPool) {
    let store = PgStore::new(pool);
    let admin = seed_user(&store, "root", Role::Admin).await;
    let alice = seed_user(&store, "alice", Role::User).await;
    let lead = store
        .create_lead(
            &new_lead("Ada", "ada@x.io", Some(alice.id)),
            &NoteAuthor::system(),
        )
        .await
        .unwrap();

    assert!(store.delete_user(alice.id, admin.id).await.unwrap());
    let lead = store.find_lead(lead.id).await.unwrap().unwrap();
    assert_eq!(lead.assigned_to, Some(admin.id));
    assert!(!store.delete_user(alice.id, admin.id).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn deleting_user_moves_every_lead_they_own(pool: PgPool) {
    let store = PgStore::new(pool);
    let alice = seed_user(&store, "alice", Role::User).await;
    let bob = seed_user(&store, "bob", Role::User).await;
    for email in ["a@x.io", "b@x.io"] {
        store
            .create_lead(&new_lead("Ada", email, Some(alice.id)), &NoteAuthor::system())
            .await
            .unwrap();
    }

    assert!(store.delete_user(alice.id, bob.id).await.unwrap());
    let owners = store.lead_counts_by_owner().await.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].owner, bob.id);
}

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn lead_lifecycle_keeps_note_history(pool: PgPool) {
    let store = PgStore::new(pool);
    let alice = seed_user(&store, "alice", Role::User).await;
    let author = NoteAuthor::user(alice.id, "alice");

    let lead = store
        .create_lead(&new_lead("Ada", "ada@x.io", Some(alice.id)), &author)
        .await
        .unwrap();
    assert_eq!(lead.notes.len(), 1);
    assert_eq!(lead.notes[0].note_type, NoteType::Created);

    let updated = store
        .update_lead(
            lead.id,
            &LeadChanges {
                status: Some(LeadStatus::Contacted),
                phone: Some(Some("555-0100".to_string())),
                ..Default::default()
            },
            &author,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, LeadStatus::Contacted);
    assert_eq!(updated.phone.as_deref(), Some("555-0100"));
    assert_eq!(updated.notes.len(), 2);
    assert_eq!(updated.notes[1].note_type, NoteType::Status);
    assert!(updated.last_contact > lead.last_contact);

    let noted = store
        .add_lead_note(
            lead.id,
            &NewNote {
                content: "Booked a demo".to_string(),
                note_type: NoteType::Meeting,
            },
            &author,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(noted.notes.len(), 3);
    assert_eq!(noted.notes[2].content, "Booked a demo");
    assert_eq!(noted.notes[2].created_by, Some(alice.id));

    assert!(store.delete_lead(lead.id).await.unwrap());
    assert!(store.find_lead(lead.id).await.unwrap().is_none());
    assert!(store
        .update_lead(lead.id, &LeadChanges::default(), &author)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn lead_email_is_unique_and_assignee_must_exist(pool: PgPool) {
    let store = PgStore::new(pool);
    store
        .create_lead(&new_lead("Ada", "ada@x.io", None), &NoteAuthor::system())
        .await
        .unwrap();

    let dup = store
        .create_lead(&new_lead("Ada 2", "ada@x.io", None), &NoteAuthor::system())
        .await;
    assert_matches!(dup, Err(CoreError::Conflict(_)));

    let orphan = store
        .create_lead(&new_lead("Bob", "bob@x.io", Some(9999)), &NoteAuthor::system())
        .await;
    assert_matches!(orphan, Err(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn list_filters_search_literally(pool: PgPool) {
    let store = PgStore::new(pool);
    let author = NoteAuthor::system();
    store
        .create_lead(&new_lead("Ada", "ada@x.io", None), &author)
        .await
        .unwrap();
    let mut other = new_lead("Grace", "grace@y.io", None);
    other.company = Some("Navy".to_string());
    other.status = LeadStatus::Converted;
    store.create_lead(&other, &author).await.unwrap();

    let search = |term: &str| LeadFilter {
        search: Some(term.to_string()),
        ..Default::default()
    };

    assert_eq!(store.list_leads(&search("100%")).await.unwrap().len(), 1);
    assert_eq!(store.list_leads(&search("GRACE")).await.unwrap().len(), 1);
    assert_eq!(store.list_leads(&search("%")).await.unwrap().len(), 1);

    let converted = store
        .list_leads(&LeadFilter {
            status: Some(LeadStatus::Converted),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(converted.len(), 1);
    assert_eq!(converted[0].name, "Grace");

    let all = store.list_leads(&LeadFilter::default()).await.unwrap();
    assert_eq!(all[0].name, "Grace");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn concurrent_status_changes_keep_a_consistent_history(pool: PgPool) {
    let store = PgStore::new(pool);
    let lead = store
        .create_lead(&new_lead("Grace", "grace@navy.mil", None), &NoteAuthor::system())
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

    // Each status note continues from where the previous one left off.
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

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn dashboard_stats_respect_scope(pool: PgPool) {
    let store = PgStore::new(pool);
    let alice = seed_user(&store, "alice", Role::User).await;
    let author = NoteAuthor::system();
    store
        .create_lead(&new_lead("Ada", "ada@x.io", Some(alice.id)), &author)
        .await
        .unwrap();
    let mut referral = new_lead("Grace", "grace@y.io", None);
    referral.source = LeadSource::Referral;
    store.create_lead(&referral, &author).await.unwrap();

    let all = store.lead_dashboard_stats(None).await.unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.sources.len(), 2);
    assert_eq!(all.recent[0].name, "Grace");

    let scoped = store.lead_dashboard_stats(Some(alice.id)).await.unwrap();
    assert_eq!(scoped.total, 1);
    assert_eq!(scoped.by_status.new, 1);

    let owners = store.lead_counts_by_owner().await.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].owner, alice.id);
    assert_eq!(owners[0].counts.total(), 1);
}
