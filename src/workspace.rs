// src/workspace.rs

//! Ephemeral per-attempt directories.
//!
//! Every compile+run attempt gets a fresh, uniquely named directory that is
//! removed once the attempt is over. Removal also happens when the inner
//! future panics or is dropped mid-flight, because the directory is owned
//! by a `TempDir` guard.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "debugrun-";

/// Create a fresh workspace under `root` (or the system temp dir), run `f`
/// with its path, then delete it.
///
/// Cleanup errors are logged, never returned.
pub async fn with_workspace<T, F, Fut>(root: Option<&Path>, f: F) -> Result<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = T>,
{
    let dir = create(root)?;
    let path = dir.path().to_path_buf();
    tracing::debug!(workspace = %path.display(), "workspace created");

    let value = f(path.clone()).await;

    if let Err(e) = dir.close() {
        tracing::warn!(workspace = %path.display(), error = %e, "failed to remove workspace");
    } else {
        tracing::debug!(workspace = %path.display(), "workspace removed");
    }

    Ok(value)
}

fn create(root: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(WORKSPACE_PREFIX);

    match root {
        Some(root) => {
            crate::util::ensure_dir(root)?;
            builder
                .tempdir_in(root)
                .with_context(|| format!("Failed to create workspace in {:?}", root))
        }
        None => builder.tempdir().context("Failed to create workspace"),
    }
}
