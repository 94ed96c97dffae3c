//! Row structs and DTOs for the `users` and `leads` tables.

pub mod lead;
pub mod stats;
pub mod user;
