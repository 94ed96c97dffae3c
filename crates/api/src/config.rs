use crate::auth::jwt::JwtConfig;

/// Credentials for the administrator account created at startup.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Default username for the bootstrapped administrator.
const DEFAULT_ADMIN_USERNAME: &str = "admin";

impl AdminBootstrap {
    /// Read `DEFAULT_ADMIN_EMAIL` / `DEFAULT_ADMIN_PASSWORD` /
    /// `DEFAULT_ADMIN_USERNAME`. `None` unless both email and password are set.
    pub fn from_env() -> Option<Self> {
        let email = non_empty_var("DEFAULT_ADMIN_EMAIL")?;
        let password = non_empty_var("DEFAULT_ADMIN_PASSWORD")?;
        let username = non_empty_var("DEFAULT_ADMIN_USERNAME")
            .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());
        Some(Self {
            username,
            email,
            password,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// PostgreSQL URL. Unset means the in-memory store.
    pub database_url: Option<String>,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Administrator to create at startup, if configured.
    pub admin: Option<AdminBootstrap>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `DATABASE_URL`         | unset (in-memory store)    |
    ///
    /// See [`JwtConfig::from_env`] and [`AdminBootstrap::from_env`] for the rest.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url: non_empty_var("DATABASE_URL"),
            jwt: JwtConfig::from_env(),
            admin: AdminBootstrap::from_env(),
        }
    }
}
