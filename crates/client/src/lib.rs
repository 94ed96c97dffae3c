//! Presentation-side client for the Nexus CRM API.
//!
//! - [`Session`] -- the signed-in user and token, shared by every caller.
//! - [`NexusClient`] -- typed calls for each API endpoint.
//! - [`requests`] -- request bodies and list filters.

pub mod client;
pub mod error;
pub mod requests;
pub mod session;

pub use client::NexusClient;
pub use error::ClientError;
pub use session::{Session, SessionData};
