//! Lead lifecycle vocabulary and validation (statuses, sources, note types).
//!
//! The string forms must match the check constraints in
//! `20260301000002_create_leads_table.sql`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Query-string value that disables a status/source filter.
pub const FILTER_ALL: &str = "All";

/// Maximum length of note content in characters.
pub const MAX_NOTE_CONTENT_LENGTH: usize = 10_000;

/// Maximum length of a lead name.
pub const MAX_LEAD_NAME_LENGTH: usize = 200;

/// Author shown on notes that no user wrote.
pub const SYSTEM_AUTHOR: &str = "System";

/// Content of the note appended when a lead is created.
pub const LEAD_CREATED_NOTE: &str = "Lead created";

/// Number of leads in the dashboard's "recent" list.
pub const RECENT_LEADS_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Declares a closed string enumeration with `as_str`, `ALL`, `Display`,
/// `FromStr` and `TryFrom<String>` (used by sqlx row decoding).
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        Err(CoreError::Validation(format!(
                            "Invalid {} '{other}'. Must be one of: {}",
                            $label,
                            allowed.join(", ")
                        )))
                    }
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

string_enum! {
    /// Position of a lead in the sales funnel. Transitions are unconstrained.
    LeadStatus, "status" {
        New => "New",
        Contacted => "Contacted",
        Converted => "Converted",
        Lost => "Lost",
    }
}

string_enum! {
    /// Channel through which a lead arrived.
    LeadSource, "source" {
        Website => "Website",
        LinkedIn => "LinkedIn",
        Referral => "Referral",
        EmailCampaign => "Email Campaign",
        Social => "Social",
        Other => "Other",
    }
}

string_enum! {
    /// Kind of entry in a lead's note history.
    NoteType, "note type" {
        Call => "call",
        Email => "email",
        Meeting => "meeting",
        Note => "note",
        Status => "status",
        Created => "created",
    }
}

impl Default for LeadStatus {
    fn default() -> Self {
        LeadStatus::New
    }
}

impl Default for LeadSource {
    fn default() -> Self {
        LeadSource::Website
    }
}

impl Default for NoteType {
    fn default() -> Self {
        NoteType::Note
    }
}

impl NoteType {
    /// Types generated by the server itself; clients may not submit them.
    pub fn is_automatic(self) -> bool {
        matches!(self, NoteType::Status | NoteType::Created)
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse an optional list filter. Absent, blank, or `"All"` means "no filter".
pub fn parse_filter<T>(raw: Option<&str>) -> Result<Option<T>, CoreError>
where
    T: FromStr<Err = CoreError>,
{
    match raw.map(str::trim) {
        None | Some("") | Some(FILTER_ALL) => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

/// Parse a user-submitted note type, defaulting to [`NoteType::Note`].
///
/// The automatic types (`status`, `created`) are reserved for server-generated
/// audit entries and rejected here.
pub fn parse_user_note_type(raw: Option<&str>) -> Result<NoteType, CoreError> {
    let note_type = match raw.map(str::trim) {
        None | Some("") => NoteType::default(),
        Some(value) => value.parse()?,
    };
    if note_type.is_automatic() {
        return Err(CoreError::Validation(format!(
            "Note type '{note_type}' is reserved for automatic entries"
        )));
    }
    Ok(note_type)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate and trim a lead name.
pub fn validate_lead_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Please add a name".to_string()));
    }
    if trimmed.chars().count() > MAX_LEAD_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Name exceeds maximum length of {MAX_LEAD_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate note content: non-empty after trimming and within the length limit.
///
/// Returns the trimmed content.
pub fn validate_note_content(content: &str) -> Result<String, CoreError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Note content is required".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NOTE_CONTENT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Note content exceeds maximum length of {MAX_NOTE_CONTENT_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalize an optional free-text field: trims, and maps blank to `None`.
pub fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// Content of the audit note appended when a lead's status changes.
pub fn status_change_note(from: LeadStatus, to: LeadStatus) -> String {
    format!("Status changed from {from} to {to}")
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Escape `%`, `_` and `\` so the term matches literally inside `ILIKE`.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring match used by the in-memory store.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Percentage of converted leads, rounded to one decimal place.
pub fn conversion_rate(converted: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = converted as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}
