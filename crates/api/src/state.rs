use std::sync::Arc;

use nexus_db::repositories::Store;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// User and lead persistence (PostgreSQL or in-memory).
    pub store: Arc<dyn Store>,
    /// Server configuration (JWT settings are read by the auth extractor).
    pub config: Arc<ServerConfig>,
}
