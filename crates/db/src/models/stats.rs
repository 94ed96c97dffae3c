//! Aggregate views over the `leads` table (dashboard and per-user stats).

use nexus_core::leads::{LeadSource, LeadStatus};
use nexus_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lead counts per status. All four statuses are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub new: i64,
    pub contacted: i64,
    pub converted: i64,
    pub lost: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: LeadStatus, count: i64) {
        match status {
            LeadStatus::New => self.new += count,
            LeadStatus::Contacted => self.contacted += count,
            LeadStatus::Converted => self.converted += count,
            LeadStatus::Lost => self.lost += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.new + self.contacted + self.converted + self.lost
    }
}

/// Number of leads from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: LeadSource,
    pub count: i64,
}

/// Sort a source distribution by descending count, then by source name.
pub fn sort_source_counts(sources: &mut [SourceCount]) {
    sources.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.source.as_str().cmp(b.source.as_str()))
    });
}

/// Projection of a lead for the dashboard's "recent leads" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RecentLead {
    pub id: DbId,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub status: LeadStatus,
    #[sqlx(try_from = "String")]
    pub source: LeadSource,
    pub created_at: Timestamp,
}

/// Dashboard summary, scoped to the caller's visible leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: i64,
    pub by_status: StatusCounts,
    /// Descending by count.
    pub sources: Vec<SourceCount>,
    /// Newest first, at most five.
    pub recent: Vec<RecentLead>,
}

/// Lead counts for a single assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerLeadCounts {
    pub owner: DbId,
    pub counts: StatusCounts,
}
