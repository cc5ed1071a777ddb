// Shared helpers: path expansion and async-to-blocking bridging

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;

use crate::error::Result;

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Run an async operation to completion on the calling thread.
///
/// Builds a fresh current-thread runtime for the call, so it must not be
/// invoked from inside another tokio runtime.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build blocking runtime")?;
    runtime.block_on(future)
}
