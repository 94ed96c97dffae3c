//! Classification of `sqlx` failures into the domain error taxonomy.

use nexus_core::error::CoreError;

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// PostgreSQL `check_violation`.
const CHECK_VIOLATION: &str = "23514";

/// Map a `sqlx` error to a [`CoreError`].
///
/// Unique violations on `uq_*` constraints become `Conflict`, foreign key and
/// check violations become `Validation`. Everything else is logged and
/// surfaced as an opaque `Internal` error.
pub fn db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown");
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) if constraint.starts_with("uq_") => {
                return CoreError::Conflict(conflict_message(constraint));
            }
            Some(FOREIGN_KEY_VIOLATION) if constraint == "fk_leads_assigned_to" => {
                return CoreError::Validation("Assigned user does not exist".to_string());
            }
            Some(CHECK_VIOLATION) => {
                return CoreError::Validation(format!("Value violates constraint: {constraint}"));
            }
            _ => {}
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal("Database error".to_string())
}

fn conflict_message(constraint: &str) -> String {
    match constraint {
        "uq_users_email" => "Email already exists".to_string(),
        "uq_users_username" => "Username already exists".to_string(),
        "uq_leads_email" => "Lead with this email already exists".to_string(),
        other => format!("Duplicate value violates unique constraint: {other}"),
    }
}
