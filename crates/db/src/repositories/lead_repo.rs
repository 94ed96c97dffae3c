//! PostgreSQL implementation of [`LeadRepository`] over the `leads` table.
//!
//! Notes live in the `notes` JSONB column. Writes that touch the note history
//! lock the row (`SELECT ... FOR UPDATE`), apply the change in Rust through
//! [`Lead::apply_changes`] / [`Lead::append_note`], and write the row back in
//! the same transaction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use nexus_core::error::{CoreError, CoreResult};
use nexus_core::leads::{escape_like, LeadSource, LeadStatus, RECENT_LEADS_LIMIT};
use nexus_core::types::DbId;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Transaction};

use super::{LeadRepository, PgStore};
use crate::error::db_error;
use crate::models::lead::{Lead, LeadChanges, LeadFilter, NewLead, NewNote, NoteAuthor};
use crate::models::stats::{
    sort_source_counts, DashboardStats, OwnerLeadCounts, RecentLead, SourceCount, StatusCounts,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, email, phone, company, source, status, assigned_to, \
                        location, last_contact, follow_up_date, notes, created_at, updated_at";

/// Columns of the dashboard's recent-leads projection.
const RECENT_COLUMNS: &str = "id, name, email, status, source, created_at";

impl PgStore {
    async fn lock_lead(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> CoreResult<Option<Lead>> {
        let query = format!("SELECT {COLUMNS} FROM leads WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)
    }

    /// Write every mutable column of `lead` back to its row.
    async fn write_lead(tx: &mut Transaction<'_, Postgres>, lead: &Lead) -> CoreResult<Lead> {
        let query = format!(
            "UPDATE leads SET
                name = $2,
                email = $3,
                phone = $4,
                company = $5,
                source = $6,
                status = $7,
                assigned_to = $8,
                location = $9,
                last_contact = $10,
                follow_up_date = $11,
                notes = $12
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(lead.id)
            .bind(&lead.name)
            .bind(&lead.email)
            .bind(&lead.phone)
            .bind(&lead.company)
            .bind(lead.source.as_str())
            .bind(lead.status.as_str())
            .bind(lead.assigned_to)
            .bind(&lead.location)
            .bind(lead.last_contact)
            .bind(lead.follow_up_date)
            .bind(Json(&lead.notes))
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error)
    }
}

fn parse_column<T>(value: &str) -> CoreResult<T>
where
    T: std::str::FromStr<Err = CoreError>,
{
    value
        .parse()
        .map_err(|e: CoreError| CoreError::Internal(format!("Corrupt lead row: {e}")))
}

#[async_trait]
impl LeadRepository for PgStore {
    async fn list_leads(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM leads WHERE TRUE"));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(source) = filter.source {
            qb.push(" AND source = ").push_bind(source.as_str());
        }
        if let Some(owner) = filter.assigned_to {
            qb.push(" AND assigned_to = ").push_bind(owner);
        }
        if let Some(term) = &filter.search {
            let pattern = format!("%{}%", escape_like(term));
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR company ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        qb.push(" OFFSET ").push_bind(filter.offset);

        qb.build_query_as::<Lead>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn find_lead(&self, id: DbId) -> CoreResult<Option<Lead>> {
        let query = format!("SELECT {COLUMNS} FROM leads WHERE id = $1");
        sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn create_lead(&self, input: &NewLead, author: &NoteAuthor) -> CoreResult<Lead> {
        let now = Utc::now();
        let notes = NewLead::initial_notes(author, now);
        let query = format!(
            "INSERT INTO leads (name, email, phone, company, source, status, assigned_to,
                                location, follow_up_date, notes, last_contact, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lead>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.company)
            .bind(input.source.as_str())
            .bind(input.status.as_str())
            .bind(input.assigned_to)
            .bind(&input.location)
            .bind(input.follow_up_date)
            .bind(Json(&notes))
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn update_lead(
        &self,
        id: DbId,
        changes: &LeadChanges,
        author: &NoteAuthor,
    ) -> CoreResult<Option<Lead>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let Some(mut lead) = Self::lock_lead(&mut tx, id).await? else {
            return Ok(None);
        };

        let status_changed = lead.apply_changes(changes, author, Utc::now());
        let updated = Self::write_lead(&mut tx, &lead).await?;
        tx.commit().await.map_err(db_error)?;

        if status_changed {
            tracing::debug!(lead_id = id, status = %updated.status, "Lead status changed");
        }
        Ok(Some(updated))
    }

    async fn add_lead_note(
        &self,
        id: DbId,
        note: &NewNote,
        author: &NoteAuthor,
    ) -> CoreResult<Option<Lead>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let Some(mut lead) = Self::lock_lead(&mut tx, id).await? else {
            return Ok(None);
        };

        lead.append_note(note, author, Utc::now());
        let updated = Self::write_lead(&mut tx, &lead).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(Some(updated))
    }

    async fn delete_lead(&self, id: DbId) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn lead_dashboard_stats(&self, assigned_to: Option<DbId>) -> CoreResult<DashboardStats> {
        let status_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM leads
             WHERE ($1::BIGINT IS NULL OR assigned_to = $1)
             GROUP BY status",
        )
        .bind(assigned_to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut by_status = StatusCounts::default();
        for (status, count) in &status_rows {
            by_status.add(parse_column::<LeadStatus>(status)?, *count);
        }

        let source_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT source, COUNT(*) FROM leads
             WHERE ($1::BIGINT IS NULL OR assigned_to = $1)
             GROUP BY source",
        )
        .bind(assigned_to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut sources = source_rows
            .iter()
            .map(|(source, count)| {
                Ok(SourceCount {
                    source: parse_column::<LeadSource>(source)?,
                    count: *count,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        sort_source_counts(&mut sources);

        let query = format!(
            "SELECT {RECENT_COLUMNS} FROM leads
             WHERE ($1::BIGINT IS NULL OR assigned_to = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        let recent = sqlx::query_as::<_, RecentLead>(&query)
            .bind(assigned_to)
            .bind(RECENT_LEADS_LIMIT as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(DashboardStats {
            total: by_status.total(),
            by_status,
            sources,
            recent,
        })
    }

    async fn lead_counts_by_owner(&self) -> CoreResult<Vec<OwnerLeadCounts>> {
        let rows: Vec<(DbId, String, i64)> = sqlx::query_as(
            "SELECT assigned_to, status, COUNT(*) FROM leads
             WHERE assigned_to IS NOT NULL
             GROUP BY assigned_to, status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut owners: BTreeMap<DbId, StatusCounts> = BTreeMap::new();
        for (owner, status, count) in &rows {
            owners
                .entry(*owner)
                .or_default()
                .add(parse_column::<LeadStatus>(status)?, *count);
        }

        Ok(owners
            .into_iter()
            .map(|(owner, counts)| OwnerLeadCounts { owner, counts })
            .collect())
    }
}
