// Auth service client operations
// Each operation opens a scoped transport session, issues one retried request and drops it

use std::path::PathBuf;

use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::headers::{bearer, namespace_auth_headers, service_auth_headers};
use super::tokens::{dot_hail_dir, ensure_private_dir, TokenStore, Tokens};
use super::types::{
    CopyPasteLoginOptions, CopyPasteLoginResponse, CreateSessionRequest, CreateUserRequest,
    DeleteSessionRequest, DeleteUserRequest, LoginOutcome, UserinfoOptions,
};
use crate::config::TransportSettings;
use crate::deploy_config::DeployConfig;
use crate::error::Result;
use crate::http_client::RetryingHttpClient;
use crate::utils::block_on;

/// Logical name of the auth service in the deploy config
pub const AUTH_SERVICE: &str = "auth";

const CREATE_SESSION_PATH: &str = "/api/v1alpha/create_session";
const DELETE_SESSION_PATH: &str = "/api/v1alpha/delete_session";
const USERS_PATH: &str = "/api/v1alpha/users";
const DELETE_USER_PATH: &str = "/api/v1alpha/users/delete";
const USERINFO_PATH: &str = "/api/v1alpha/userinfo";
const COPY_PASTE_LOGIN_PATH: &str = "/api/v1alpha/copy-paste-login";

/// Client for the auth service
///
/// Owns the token store it authorizes requests with; only a successful
/// `copy_paste_login` mutates it.
pub struct AuthClient<S: TokenStore = Tokens> {
    deploy_config: DeployConfig,
    tokens: S,
    settings: TransportSettings,
    dot_hail_dir: Option<PathBuf>,
}

impl AuthClient<Tokens> {
    /// Client from the process environment: deploy config, tokens file and
    /// transport settings
    pub fn from_env() -> Result<Self> {
        let deploy_config = DeployConfig::load()?;
        let tokens = Tokens::load()?;
        Ok(Self::new(deploy_config, tokens)
            .with_settings(TransportSettings::from_env())
            .with_dot_hail_dir(dot_hail_dir()))
    }
}

impl<S: TokenStore> AuthClient<S> {
    pub fn new(deploy_config: DeployConfig, tokens: S) -> Self {
        Self {
            deploy_config,
            tokens,
            settings: TransportSettings::default(),
            dot_hail_dir: None,
        }
    }

    pub fn with_settings(mut self, settings: TransportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Directory created (mode 0700) by a successful copy-paste login
    pub fn with_dot_hail_dir(mut self, dir: PathBuf) -> Self {
        self.dot_hail_dir = Some(dir);
        self
    }

    pub fn deploy_config(&self) -> &DeployConfig {
        &self.deploy_config
    }

    pub fn tokens(&self) -> &S {
        &self.tokens
    }

    pub fn into_tokens(self) -> S {
        self.tokens
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        service_auth_headers(&self.deploy_config, AUTH_SERVICE, true, &self.tokens)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let headers = self.auth_headers()?;
        let url = self.deploy_config.url(AUTH_SERVICE, path);

        let session = RetryingHttpClient::new(&self.settings, self.settings.request_timeout)?;
        let request = session
            .request(Method::POST, &url)
            .headers(headers)
            .json(body)
            .build()?;
        let response = session.request_with_retry(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Create a session for `username` (developers creating service-account sessions)
    pub async fn create_session(&self, request: &CreateSessionRequest) -> Result<Value> {
        tracing::debug!(username = %request.username, "Creating session");
        self.post_json(CREATE_SESSION_PATH, request).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<Value> {
        let body = DeleteSessionRequest {
            session_id: session_id.to_string(),
        };
        self.post_json(DELETE_SESSION_PATH, &body).await
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<Value> {
        tracing::debug!(
            username = %request.username,
            is_developer = request.is_developer,
            is_service_account = request.is_service_account,
            "Creating user"
        );
        self.post_json(USERS_PATH, request).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<Value> {
        tracing::debug!(username = username, "Deleting user");
        let body = DeleteUserRequest {
            username: username.to_string(),
        };
        self.post_json(DELETE_USER_PATH, &body).await
    }

    /// Information about the authenticated user.
    ///
    /// Returns `Ok(None)` when the service answers 401; every other error
    /// status is returned as an error.
    pub async fn get_userinfo(&self, options: &UserinfoOptions) -> Result<Option<Value>> {
        let headers = match &options.session_id {
            Some(session_id) => {
                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, bearer("session", session_id)?);
                headers
            }
            None => self.auth_headers()?,
        };
        let url = self.deploy_config.url(AUTH_SERVICE, USERINFO_PATH);

        let session = RetryingHttpClient::new(&self.settings, self.settings.request_timeout)?;
        let request = session.request(Method::GET, &url).headers(headers).build()?;

        match session.request_with_retry(request).await {
            Ok(response) => {
                let bytes = response.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("Userinfo returned 401, not authenticated");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange a copy-paste token for a durable namespace token.
    ///
    /// The new token is stored under the auth namespace (or
    /// `options.namespace`) and the store is written once the exchange
    /// succeeds, after creating the `~/.hail` directory if it is missing.
    /// Nothing is mutated on failure.
    pub async fn copy_paste_login(
        &mut self,
        copy_paste_token: &str,
        options: &CopyPasteLoginOptions,
    ) -> Result<LoginOutcome> {
        let (namespace, deploy_config) = match &options.namespace {
            Some(ns) => (ns.clone(), self.deploy_config.with_service(AUTH_SERVICE, ns)),
            None => (
                self.deploy_config.service_ns(AUTH_SERVICE).to_string(),
                self.deploy_config.clone(),
            ),
        };
        let headers = namespace_auth_headers(&deploy_config, &namespace, false, &self.tokens)?;
        let url = deploy_config.url(AUTH_SERVICE, COPY_PASTE_LOGIN_PATH);

        let login: CopyPasteLoginResponse = {
            let session = RetryingHttpClient::with_default_headers(
                &self.settings,
                self.settings.login_timeout,
                headers,
            )?;
            let request = session
                .request(Method::POST, &url)
                .query(&[("copy_paste_token", copy_paste_token)])
                .build()?;
            let response = session.request_with_retry(request).await?;
            let bytes = response.bytes().await?;
            serde_json::from_slice(&bytes)?
        };

        // ~/.hail itself, independent of where the tokens file lives
        if let Some(dir) = &self.dot_hail_dir {
            ensure_private_dir(dir)?;
        }
        self.tokens.set(&namespace, login.token);
        self.tokens.write()?;

        tracing::info!(
            namespace = %namespace,
            username = %login.username,
            "Logged in"
        );

        Ok(LoginOutcome {
            namespace,
            username: login.username,
        })
    }

    // === Blocking counterparts ===

    pub fn create_session_blocking(&self, request: &CreateSessionRequest) -> Result<Value> {
        block_on(self.create_session(request))
    }

    pub fn delete_session_blocking(&self, session_id: &str) -> Result<Value> {
        block_on(self.delete_session(session_id))
    }

    pub fn create_user_blocking(&self, request: &CreateUserRequest) -> Result<Value> {
        block_on(self.create_user(request))
    }

    pub fn delete_user_blocking(&self, username: &str) -> Result<Value> {
        block_on(self.delete_user(username))
    }

    pub fn get_userinfo_blocking(&self, options: &UserinfoOptions) -> Result<Option<Value>> {
        block_on(self.get_userinfo(options))
    }

    pub fn copy_paste_login_blocking(
        &mut self,
        copy_paste_token: &str,
        options: &CopyPasteLoginOptions,
    ) -> Result<LoginOutcome> {
        block_on(self.copy_paste_login(copy_paste_token, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy_config::Location;
    use crate::error::AuthError;
    use mockito::Matcher;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::HashMap;

    /// In-memory store that counts writes
    #[derive(Default)]
    struct MemoryTokens {
        tokens: HashMap<String, String>,
        writes: Cell<usize>,
    }

    impl MemoryTokens {
        fn with(entries: &[(&str, &str)]) -> Self {
            let mut store = Self::default();
            for (ns, token) in entries {
                store.tokens.insert(ns.to_string(), token.to_string());
            }
            store
        }
    }

    impl TokenStore for MemoryTokens {
        fn namespace_token(&self, namespace: &str) -> Option<&str> {
            self.tokens.get(namespace).map(String::as_str)
        }

        fn set(&mut self, namespace: &str, token: String) {
            self.tokens.insert(namespace.to_string(), token);
        }

        fn write(&self) -> Result<()> {
            self.writes.set(self.writes.get() + 1);
            Ok(())
        }
    }

    fn settings() -> TransportSettings {
        TransportSettings {
            max_retries: 0,
            base_delay_ms: 1,
            ..TransportSettings::default()
        }
    }

    fn client(
        server: &mockito::ServerGuard,
        location: Location,
        tokens: MemoryTokens,
    ) -> AuthClient<MemoryTokens> {
        let config =
            DeployConfig::new(location, "default", "hail.is").with_base_url(AUTH_SERVICE, &server.url());
        AuthClient::new(config, tokens).with_settings(settings())
    }

    #[tokio::test]
    async fn test_create_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1alpha/create_session")
            .match_header("authorization", "Bearer T2")
            .match_header("x-hail-internal-authorization", Matcher::Missing)
            .match_body(Matcher::Json(json!({"username": "ci", "max_age_secs": 600})))
            .with_header("content-type", "application/json")
            .with_body(r#"{"session_id": "s-1"}"#)
            .create_async()
            .await;

        let client = client(&server, Location::External, MemoryTokens::with(&[("default", "T2")]));
        let resp = client
            .create_session(&CreateSessionRequest::new("ci").max_age_secs(600))
            .await
            .unwrap();

        assert_eq!(resp, json!({"session_id": "s-1"}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1alpha/delete_session")
            .match_body(Matcher::Json(json!({"session_id": "s-1"})))
            .with_body("{}")
            .create_async()
            .await;

        let client = client(&server, Location::External, MemoryTokens::with(&[("default", "T2")]));
        assert_eq!(client.delete_session("s-1").await.unwrap(), json!({}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_user_non_default_namespace_external() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1alpha/users")
            .match_header("authorization", "Bearer T1")
            .match_header("x-hail-internal-authorization", "Bearer T2")
            .match_body(Matcher::Json(json!({
                "username": "bob",
                "email": "bob@example.org",
                "is_developer": true,
                "is_service_account": false
            })))
            .with_body(r#"{"id": 7}"#)
            .create_async()
            .await;

        let config = DeployConfig::new(Location::External, "default", "hail.is")
            .with_service(AUTH_SERVICE, "dev")
            .with_base_url(AUTH_SERVICE, &server.url());
        let client = AuthClient::new(config, MemoryTokens::with(&[("dev", "T1"), ("default", "T2")]))
            .with_settings(settings());

        let request =
            CreateUserRequest::new("bob", Some("bob@example.org".to_string())).developer(true);
        assert_eq!(client.create_user(&request).await.unwrap(), json!({"id": 7}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1alpha/users/delete")
            .match_body(Matcher::Json(json!({"username": "bob"})))
            .with_body("{}")
            .create_async()
            .await;

        let client = client(&server, Location::Internal, MemoryTokens::with(&[("default", "T2")]));
        client.delete_user("bob").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1alpha/users/delete")
            .with_status(404)
            .with_body("no such user")
            .create_async()
            .await;

        let client = client(&server, Location::External, MemoryTokens::with(&[("default", "T2")]));
        let err = client.delete_user("ghost").await.unwrap_err();
        assert!(matches!(err, AuthError::Http { status: 404, ref body } if body == "no such user"));
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1alpha/create_session")
            .expect(0)
            .create_async()
            .await;

        let client = client(&server, Location::External, MemoryTokens::default());
        let err = client
            .create_session(&CreateSessionRequest::new("ci"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingToken { ref namespace } if namespace == "default"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_userinfo_401_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1alpha/userinfo")
            .with_status(401)
            .create_async()
            .await;

        let client = client(&server, Location::External, MemoryTokens::with(&[("default", "T2")]));
        let info = client.get_userinfo(&UserinfoOptions::default()).await.unwrap();
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn test_userinfo_403_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1alpha/userinfo")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let client = client(&server, Location::External, MemoryTokens::with(&[("default", "T2")]));
        let err = client
            .get_userinfo(&UserinfoOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Http { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_userinfo_with_session_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1alpha/userinfo")
            .match_header("authorization", "Bearer sess-42")
            .match_header("x-hail-internal-authorization", Matcher::Missing)
            .with_body(r#"{"username": "alice"}"#)
            .create_async()
            .await;

        // No stored tokens needed when a session id is given
        let config = DeployConfig::new(Location::External, "default", "hail.is")
            .with_service(AUTH_SERVICE, "dev")
            .with_base_url(AUTH_SERVICE, &server.url());
        let client = AuthClient::new(config, MemoryTokens::default()).with_settings(settings());

        let options = UserinfoOptions {
            session_id: Some("sess-42".to_string()),
        };
        let info = client.get_userinfo(&options).await.unwrap();
        assert_eq!(info, Some(json!({"username": "alice"})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_copy_paste_login_stores_token_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1alpha/copy-paste-login")
            .match_query(Matcher::UrlEncoded(
                "copy_paste_token".to_string(),
                "paste-me".to_string(),
            ))
            .match_header("authorization", Matcher::Missing)
            .match_header("x-hail-internal-authorization", "Bearer T2")
            .with_body(r#"{"token": "XYZ", "username": "alice"}"#)
            .create_async()
            .await;

        let mut client = client(&server, Location::External, MemoryTokens::with(&[("default", "T2")]));
        let options = CopyPasteLoginOptions {
            namespace: Some("dev".to_string()),
        };
        let outcome = client.copy_paste_login("paste-me", &options).await.unwrap();

        assert_eq!(
            outcome,
            LoginOutcome {
                namespace: "dev".to_string(),
                username: "alice".to_string(),
            }
        );
        assert_eq!(client.tokens().namespace_token("dev"), Some("XYZ"));
        assert_eq!(client.tokens().writes.get(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_copy_paste_login_default_namespace() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1alpha/copy-paste-login")
            .match_query(Matcher::Any)
            .match_header("x-hail-internal-authorization", Matcher::Missing)
            .with_body(r#"{"token": "NEW", "username": "alice"}"#)
            .create_async()
            .await;

        // First login needs no stored token at all
        let mut client = client(&server, Location::External, MemoryTokens::default());
        let outcome = client
            .copy_paste_login("paste-me", &CopyPasteLoginOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.namespace, "default");
        assert_eq!(client.tokens().namespace_token("default"), Some("NEW"));
    }

    #[tokio::test]
    async fn test_copy_paste_login_failure_leaves_store_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1alpha/copy-paste-login")
            .match_query(Matcher::Any)
            .with_status(400)
            .create_async()
            .await;

        let mut client = client(&server, Location::Internal, MemoryTokens::default());
        let err = client
            .copy_paste_login("expired", &CopyPasteLoginOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert_eq!(client.tokens().namespace_token("default"), None);
        assert_eq!(client.tokens().writes.get(), 0);
    }

    #[tokio::test]
    async fn test_copy_paste_login_creates_dot_hail_dir() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1alpha/copy-paste-login")
            .match_query(Matcher::Any)
            .with_body(r#"{"token": "XYZ", "username": "alice"}"#)
            .create_async()
            .await;

        let home = tempfile::tempdir().unwrap();
        let hail_dir = home.path().join(".hail");
        let mut client = client(&server, Location::External, MemoryTokens::default())
            .with_dot_hail_dir(hail_dir.clone());

        client
            .copy_paste_login("paste-me", &CopyPasteLoginOptions::default())
            .await
            .unwrap();

        assert!(hail_dir.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&hail_dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[tokio::test]
    async fn test_failed_login_does_not_create_dot_hail_dir() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1alpha/copy-paste-login")
            .match_query(Matcher::Any)
            .with_status(400)
            .create_async()
            .await;

        let home = tempfile::tempdir().unwrap();
        let hail_dir = home.path().join(".hail");
        let mut client = client(&server, Location::External, MemoryTokens::default())
            .with_dot_hail_dir(hail_dir.clone());

        assert!(client
            .copy_paste_login("expired", &CopyPasteLoginOptions::default())
            .await
            .is_err());
        assert!(!hail_dir.exists());
    }
}
