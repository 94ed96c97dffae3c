//! Errors surfaced by [`NexusClient`](crate::NexusClient).

use serde::Deserialize;

/// Errors from the Nexus HTTP API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// An authenticated call was attempted without a signed-in session.
    #[error("Not signed in")]
    NotSignedIn,

    /// The server answered with a non-2xx status.
    #[error("{message} ({status})")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine-readable code from the error body, e.g. `FORBIDDEN`.
        code: Option<String>,
        /// Human-readable message from the error body, or the raw body.
        message: String,
    },
}

impl ClientError {
    /// HTTP status of an [`ClientError::Api`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the caller's credentials or token.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Build an [`ClientError::Api`] from a status and the raw response body.
    ///
    /// Bodies in the server's `{ "error", "code" }` shape are unpacked; anything
    /// else is kept verbatim as the message.
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: String,
            code: Option<String>,
        }

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => ClientError::Api {
                status,
                code: parsed.code,
                message: parsed.error,
            },
            Err(_) => ClientError::Api {
                status,
                code: None,
                message: body.to_string(),
            },
        }
    }
}
