//! Domain vocabulary shared by every Nexus crate.
//!
//! Zero internal dependencies: roles, lead statuses/sources/note types,
//! field validation, pagination helpers, the error taxonomy and the access
//! policy.

pub mod access;
pub mod error;
pub mod leads;
pub mod pagination;
pub mod roles;
pub mod types;
pub mod users;
