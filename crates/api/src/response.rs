//! Shared response envelope types for API handlers.
//!
//! All API responses except the auth token responses use a `{ "data": ... }`
//! envelope. Use [`DataResponse`] instead of ad-hoc `json!({ "data": ... })`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
