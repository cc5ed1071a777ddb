// Namespace token storage
// Maps namespace names to bearer tokens, persisted as a JSON object

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AuthError, Result};
use crate::utils::expand_tilde;

const DEFAULT_TOKENS_FILE: &str = "~/.hail/tokens.json";
const DOT_HAIL_DIR: &str = "~/.hail";

/// Key-value store of namespace bearer tokens
pub trait TokenStore {
    /// Token for `namespace`, if one is stored
    fn namespace_token(&self, namespace: &str) -> Option<&str>;

    /// Store `token` for `namespace`, replacing any previous one
    fn set(&mut self, namespace: &str, token: String);

    /// Persist the current mapping
    fn write(&self) -> Result<()>;

    /// Token for `namespace`, or `MissingToken` if none is stored
    fn namespace_token_or_error(&self, namespace: &str) -> Result<&str> {
        self.namespace_token(namespace)
            .ok_or_else(|| AuthError::MissingToken {
                namespace: namespace.to_string(),
            })
    }
}

/// Resolve the tokens file: HAIL_TOKENS_FILE > ~/.hail/tokens.json
pub fn default_tokens_file() -> PathBuf {
    std::env::var("HAIL_TOKENS_FILE")
        .map(|s| expand_tilde(&s))
        .unwrap_or_else(|_| expand_tilde(DEFAULT_TOKENS_FILE))
}

/// The per-user `~/.hail` directory
pub fn dot_hail_dir() -> PathBuf {
    expand_tilde(DOT_HAIL_DIR)
}

/// Create `dir` with mode 0700 unless it already exists.
///
/// Only `dir` itself is created; a missing parent is an error.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    create_private_dir(dir).map_err(|source| AuthError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %dir.display(), "Created private directory");
    Ok(())
}

/// File-backed token store
#[derive(Debug, Clone)]
pub struct Tokens {
    tokens: BTreeMap<String, String>,
    path: PathBuf,
}

impl Tokens {
    /// Empty store that will persist to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            tokens: BTreeMap::new(),
            path,
        }
    }

    /// Load tokens from the default location
    pub fn load() -> Result<Self> {
        Self::from_file(default_tokens_file())
    }

    /// Load tokens from `path`; a missing file yields an empty store
    pub fn from_file(path: PathBuf) -> Result<Self> {
        if !path.is_file() {
            tracing::info!("Tokens file not found at {}, starting empty", path.display());
            return Ok(Self::new(path));
        }

        let raw = fs::read_to_string(&path).map_err(|source| AuthError::Io {
            path: path.clone(),
            source,
        })?;
        let tokens: BTreeMap<String, String> = serde_json::from_str(&raw)?;

        tracing::debug!(
            path = %path.display(),
            namespaces = tokens.len(),
            "Loaded tokens"
        );

        Ok(Self { tokens, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Namespaces that currently hold a token
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> AuthError {
        AuthError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl TokenStore for Tokens {
    fn namespace_token(&self, namespace: &str) -> Option<&str> {
        self.tokens.get(namespace).map(String::as_str)
    }

    fn set(&mut self, namespace: &str, token: String) {
        self.tokens.insert(namespace.to_string(), token);
    }

    /// Atomically replace the tokens file, creating its directory owner-only
    fn write(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            ensure_private_dir(dir)?;
        }

        let body = serde_json::to_vec(&self.tokens)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp).map_err(|e| self.io_error(&tmp, e))?;
        file.write_all(&body)
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), "Wrote tokens");
        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
