// Authorization header derivation
// Decides which bearer tokens accompany a request to a namespace

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use super::tokens::TokenStore;
use crate::deploy_config::{DeployConfig, Location, DEFAULT_NAMESPACE};
use crate::error::{AuthError, Result};

/// Header carrying the default namespace's token on cross-namespace hops
pub const INTERNAL_AUTHORIZATION: HeaderName =
    HeaderName::from_static("x-hail-internal-authorization");

/// Build a sensitive `Bearer <token>` header value; `credential` names the
/// token's owner in the error
pub fn bearer(credential: &str, token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
        AuthError::InvalidHeader {
            credential: credential.to_string(),
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Headers authorizing a request to `namespace`.
///
/// With `authorize_target` the namespace's own token goes in `Authorization`.
/// External callers addressing a non-default namespace must also present the
/// default namespace's token in `X-Hail-Internal-Authorization`; that header
/// is added whether or not the target is authorized.
pub fn namespace_auth_headers<S: TokenStore + ?Sized>(
    deploy_config: &DeployConfig,
    namespace: &str,
    authorize_target: bool,
    tokens: &S,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if authorize_target {
        let token = tokens.namespace_token_or_error(namespace)?;
        headers.insert(AUTHORIZATION, bearer(namespace, token)?);
    }

    if deploy_config.location() == Location::External && namespace != DEFAULT_NAMESPACE {
        let token = tokens.namespace_token_or_error(DEFAULT_NAMESPACE)?;
        headers.insert(INTERNAL_AUTHORIZATION, bearer(DEFAULT_NAMESPACE, token)?);
    }

    tracing::trace!(
        namespace = namespace,
        location = %deploy_config.location(),
        authorize_target = authorize_target,
        header_count = headers.len(),
        "Derived auth headers"
    );

    Ok(headers)
}

/// Headers authorizing a request to whichever namespace `service` resolves to
pub fn service_auth_headers<S: TokenStore + ?Sized>(
    deploy_config: &DeployConfig,
    service: &str,
    authorize_target: bool,
    tokens: &S,
) -> Result<HeaderMap> {
    let namespace = deploy_config.service_ns(service);
    namespace_auth_headers(deploy_config, namespace, authorize_target, tokens)
}
