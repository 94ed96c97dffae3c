//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated caller from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- Requires the account-management permission.

pub mod auth;
pub mod rbac;
