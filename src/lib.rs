// Hail auth client - library root

pub mod auth;
pub mod config;
pub mod deploy_config;
pub mod error;
pub mod http_client;
pub mod utils;

pub use auth::AuthClient;
pub use deploy_config::{DeployConfig, Location};
pub use error::{AuthError, Result};
