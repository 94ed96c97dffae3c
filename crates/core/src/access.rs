//! Access policy: the single authorization decision for every protected
//! operation on leads and user accounts.
//!
//! [`authorize`] is pure. Handlers call it before touching a store and use the
//! returned [`Grant`] to scope what they read or write.
//!
//! Rules, first match wins:
//!
//! 1. No caller: every action is `Unauthorized`.
//! 2. Deleting one's own account is `Forbidden`, for administrators too.
//! 3. Administrators may do anything, unscoped.
//! 4. Users list leads and view stats scoped to their own assignments, and
//!    may only read leads assigned to them.
//! 5. Users may create leads; the lead is always assigned to them.
//! 6. Users may update or annotate only leads assigned to them.
//! 7. Users may not delete leads or manage accounts.

use crate::error::CoreError;
use crate::roles::Role;
use crate::types::DbId;

/// Message attached to every policy denial.
pub const ACCESS_DENIED: &str = "Access denied";

/// The authenticated identity making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: DbId,
    pub role: Role,
}

impl Caller {
    pub fn new(id: DbId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// An operation subject to the access policy, carrying the ownership facts
/// the decision needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListLeads,
    ViewLeadStats,
    ReadLead { assigned_to: Option<DbId> },
    CreateLead,
    UpdateLead { assigned_to: Option<DbId> },
    AddNote { assigned_to: Option<DbId> },
    DeleteLead,
    /// List, create, read, update, reset-password and stats on accounts.
    ManageUsers,
    DeleteUser { target: DbId },
}

/// The scope an allowed action runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// No restriction.
    All,
    /// Restricted to leads assigned to the given user.
    AssignedTo(DbId),
}

impl Grant {
    /// The assignee filter implied by this grant, if any.
    pub fn assignee(self) -> Option<DbId> {
        match self {
            Grant::All => None,
            Grant::AssignedTo(id) => Some(id),
        }
    }
}

/// Decide whether `caller` may perform `action`.
pub fn authorize(caller: Option<&Caller>, action: Action) -> Result<Grant, CoreError> {
    let Some(caller) = caller else {
        return Err(CoreError::Unauthorized("Authentication required".into()));
    };

    if let Action::DeleteUser { target } = action {
        if target == caller.id {
            return Err(CoreError::Forbidden(
                "Cannot delete your own account".into(),
            ));
        }
    }

    if caller.is_admin() {
        return Ok(Grant::All);
    }

    match action {
        Action::ListLeads | Action::ViewLeadStats | Action::CreateLead => {
            Ok(Grant::AssignedTo(caller.id))
        }
        Action::ReadLead { assigned_to }
        | Action::UpdateLead { assigned_to }
        | Action::AddNote { assigned_to } => {
            if assigned_to == Some(caller.id) {
                Ok(Grant::AssignedTo(caller.id))
            } else {
                Err(denied())
            }
        }
        Action::DeleteLead | Action::ManageUsers | Action::DeleteUser { .. } => Err(denied()),
    }
}

/// Resolve the assignee of a lead being created by `caller`.
///
/// Administrators may pick any assignee and default to themselves; users are
/// always assigned their own leads regardless of what they asked for.
pub fn owner_for_new_lead(caller: &Caller, requested: Option<DbId>) -> DbId {
    if caller.is_admin() {
        requested.unwrap_or(caller.id)
    } else {
        caller.id
    }
}

/// Check a requested change of assignee on an existing lead.
///
/// Only administrators may reassign leads. A user "reassigning" a lead to
/// themselves is a no-op and allowed.
pub fn ensure_can_reassign(caller: &Caller, new_assignee: Option<DbId>) -> Result<(), CoreError> {
    if caller.is_admin() || new_assignee == Some(caller.id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only administrators can reassign leads".into(),
        ))
    }
}

fn denied() -> CoreError {
    CoreError::Forbidden(ACCESS_DENIED.into())
}
