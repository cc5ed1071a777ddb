// Error handling module
// Defines the error type shared by the header deriver, token store and client operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by auth client operations
#[derive(Error, Debug)]
pub enum AuthError {
    /// No token is stored for the requested namespace
    #[error(
        "You are not authenticated for namespace `{namespace}`. Please log in with:\n\n  $ hail-auth login{}\n\nto obtain new credentials.",
        login_hint(.namespace)
    )]
    MissingToken { namespace: String },

    /// Non-2xx response from the auth service
    #[error("HTTP error: {status} - {body}")]
    Http { status: u16, body: String },

    /// Network failure that survived all transport retries
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A token cannot be carried in an HTTP header
    #[error("Token for `{credential}` is not a valid HTTP header value")]
    InvalidHeader { credential: String },

    /// Reading or writing a local file (tokens, deploy config) failed
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON in a tokens file, deploy config or response body
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// HTTP status of the failed response, if this error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a 401 response from the auth service
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

fn login_hint(namespace: &str) -> String {
    if namespace == "default" {
        String::new()
    } else {
        format!(" -n {}", namespace)
    }
}

/// Result type alias for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;
