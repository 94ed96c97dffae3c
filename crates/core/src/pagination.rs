//! List pagination clamping helpers.

/// Maximum number of leads per page when a limit is requested.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Clamp a user-provided limit to `[1, max]`. An absent limit stays absent,
/// meaning "every matching row".
pub fn clamp_limit(limit: Option<i64>, max: i64) -> Option<i64> {
    limit.map(|l| l.clamp(1, max))
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
