use clap::{Parser, Subcommand};
use std::time::Duration;

/// Timeout for session, user and userinfo requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the copy-paste login request
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Hail auth client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// HTTP max retries for transient failures
    #[arg(long, env = "HAIL_HTTP_MAX_RETRIES", default_value = "3", global = true)]
    pub http_retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in by pasting a token obtained from the browser
    Login {
        /// Copy-paste token; prompted for when omitted
        token: Option<String>,

        /// Namespace to log in to
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Print information about the logged-in user
    User {
        /// Look the user up by session id instead of the stored token
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Create a user
    CreateUser {
        username: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        developer: bool,

        #[arg(long)]
        service_account: bool,
    },

    /// Delete a user
    DeleteUser { username: String },

    /// Create a session for a user (developers only)
    CreateSession {
        username: String,

        #[arg(long)]
        max_age_secs: Option<u64>,
    },

    /// Delete a session
    DeleteSession { session_id: String },
}

/// Retry and timeout settings for the transport
#[derive(Clone, Debug, PartialEq)]
pub struct TransportSettings {
    /// Maximum retries for transient failures
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    pub base_delay_ms: u64,

    /// Total timeout for standard requests
    pub request_timeout: Duration,

    /// Total timeout for the copy-paste login request
    pub login_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }
}

impl TransportSettings {
    /// Load settings with priority: ENV > defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_retries: std::env::var("HAIL_HTTP_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),

            base_delay_ms: std::env::var("HAIL_HTTP_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay_ms),

            ..defaults
        }
    }
}
