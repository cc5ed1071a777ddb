// Deployment configuration
// Maps logical services to namespaces and URLs

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AuthError, Result};
use crate::utils::expand_tilde;

/// Namespace whose token anchors the deployment's trust domain
pub const DEFAULT_NAMESPACE: &str = "default";

const DEFAULT_DOMAIN: &str = "hail.is";
const DEFAULT_CONFIG_FILE: &str = "~/.hail/deploy-config.json";

/// Where the running process sits relative to the deployment's trust boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Inside the cluster (k8s pods, gce hosts)
    Internal,
    /// Outside the cluster, talking through the public gateway
    External,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Internal => "internal",
            Location::External => "external",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "external" => Ok(Location::External),
            "internal" | "k8s" | "gce" => Ok(Location::Internal),
            other => Err(AuthError::Config(format!("Unknown location: {}", other))),
        }
    }
}

/// On-disk deploy config format
#[derive(Debug, Deserialize)]
struct DeployConfigFile {
    location: String,
    default_namespace: String,
    #[serde(default)]
    domain: Option<String>,
}

/// Immutable per-process deployment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
    location: Location,
    default_namespace: String,
    domain: String,
    service_namespace: HashMap<String, String>,
    service_base_url: HashMap<String, String>,
}

impl DeployConfig {
    pub fn new(location: Location, default_namespace: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            location,
            default_namespace: default_namespace.into(),
            domain: domain.into(),
            service_namespace: HashMap::new(),
            service_base_url: HashMap::new(),
        }
    }

    /// Load configuration with priority: ENV > config file > defaults
    pub fn load() -> Result<Self> {
        let path = std::env::var("HAIL_DEPLOY_CONFIG_FILE")
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(|_| expand_tilde(DEFAULT_CONFIG_FILE));

        let mut config = Self::from_file(&path)?;

        if let Ok(location) = std::env::var("HAIL_LOCATION") {
            config.location = location.parse()?;
        }
        if let Ok(ns) = std::env::var("HAIL_DEFAULT_NAMESPACE") {
            config.default_namespace = ns;
        }
        if let Ok(domain) = std::env::var("HAIL_DOMAIN") {
            config.domain = domain;
        }

        tracing::debug!(
            location = %config.location,
            default_namespace = %config.default_namespace,
            domain = %config.domain,
            "Loaded deploy config"
        );

        Ok(config)
    }

    /// Read a deploy config file, falling back to external defaults when it is absent
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            tracing::debug!("Deploy config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: DeployConfigFile = serde_json::from_str(raw)?;
        Ok(Self::new(
            file.location.parse()?,
            file.default_namespace,
            file.domain.unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
        ))
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Namespace a service is routed to
    pub fn service_ns(&self, service: &str) -> &str {
        self.service_namespace
            .get(service)
            .map(String::as_str)
            .unwrap_or(&self.default_namespace)
    }

    /// Copy of this config with `service` routed to `ns`
    pub fn with_service(&self, service: &str, ns: &str) -> Self {
        let mut config = self.clone();
        config
            .service_namespace
            .insert(service.to_string(), ns.to_string());
        config
    }

    /// Copy of this config with `service` pinned to an explicit base URL
    pub fn with_base_url(&self, service: &str, base_url: &str) -> Self {
        let mut config = self.clone();
        config.service_base_url.insert(
            service.to_string(),
            base_url.trim_end_matches('/').to_string(),
        );
        config
    }

    pub fn base_url(&self, service: &str) -> String {
        if let Some(url) = self.service_base_url.get(service) {
            return url.clone();
        }

        let ns = self.service_ns(service);
        match self.location {
            Location::Internal => format!("https://{}.{}", service, ns),
            Location::External if ns == DEFAULT_NAMESPACE => {
                format!("https://{}.{}", service, self.domain)
            }
            Location::External => format!("https://internal.{}/{}/{}", self.domain, ns, service),
        }
    }

    pub fn url(&self, service: &str, path: &str) -> String {
        format!("{}{}", self.base_url(service), path)
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self::new(Location::External, DEFAULT_NAMESPACE, DEFAULT_DOMAIN)
    }
}
