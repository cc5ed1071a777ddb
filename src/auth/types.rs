// Auth service request and response payloads

use serde::{Deserialize, Serialize};

/// Body of POST /api/v1alpha/create_session
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateSessionRequest {
    pub username: String,
    /// Session lifetime; the server default applies when `None`
    pub max_age_secs: Option<u64>,
}

impl CreateSessionRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            max_age_secs: None,
        }
    }

    pub fn max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }
}

/// Body of POST /api/v1alpha/delete_session
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeleteSessionRequest {
    pub session_id: String,
}

/// Body of POST /api/v1alpha/users
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: Option<String>,
    pub is_developer: bool,
    pub is_service_account: bool,
}

impl CreateUserRequest {
    /// Regular (non-developer, human) user
    pub fn new(username: impl Into<String>, email: Option<String>) -> Self {
        Self {
            username: username.into(),
            email,
            is_developer: false,
            is_service_account: false,
        }
    }

    pub fn developer(mut self, is_developer: bool) -> Self {
        self.is_developer = is_developer;
        self
    }

    pub fn service_account(mut self, is_service_account: bool) -> Self {
        self.is_service_account = is_service_account;
        self
    }
}

/// Body of POST /api/v1alpha/users/delete
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeleteUserRequest {
    pub username: String,
}

/// Options for GET /api/v1alpha/userinfo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserinfoOptions {
    /// Authenticate with this session id instead of the stored namespace token
    pub session_id: Option<String>,
}

/// Options for the copy-paste login flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyPasteLoginOptions {
    /// Log in to this namespace instead of the one the auth service resolves to
    pub namespace: Option<String>,
}

/// Response of POST /api/v1alpha/copy-paste-login
#[derive(Debug, Clone, Deserialize)]
pub struct CopyPasteLoginResponse {
    pub token: String,
    pub username: String,
}

/// Result of a successful copy-paste login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Namespace the new token was stored under
    pub namespace: String,
    pub username: String,
}
