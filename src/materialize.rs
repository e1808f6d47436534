//! Write-once config files.
//!
//! A target that exists in any form (even empty or invalid) is never touched
//! again. New files are opened with `create_new`, so a file that appears
//! between the check and the write is also left alone.
use crate::host::Host;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Result of a local materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Created,
    AlreadyPresent,
}

/// Result of a materialization whose default content comes from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteMaterialized {
    Created,
    AlreadyPresent,
    /// Fetch failed; nothing written. The framework falls back to its own defaults.
    FetchFailed(String),
    /// Fetched, but the local write failed; nothing written.
    WriteFailed(String),
}

impl RemoteMaterialized {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteMaterialized::Created => "created",
            RemoteMaterialized::AlreadyPresent => "already present",
            RemoteMaterialized::FetchFailed(_) => "fetch failed",
            RemoteMaterialized::WriteFailed(_) => "write failed",
        }
    }
}

/// True when nothing exists at `path`. Dangling symlinks count as present.
pub fn needs_write(path: &Path) -> bool {
    fs::symlink_metadata(path).is_err()
}

/// Write `default_content` to `target` only if nothing exists there.
pub fn materialize(target: &Path, default_content: &str) -> Result<Materialized> {
    if !needs_write(target) {
        tracing::debug!(path = %target.display(), "already present; leaving untouched");
        return Ok(Materialized::AlreadyPresent);
    }
    write_new(target, default_content)
}

/// Fetch `url` into `target` only if nothing exists there. Fetch and write
/// failures are reported in the outcome, not raised.
pub fn materialize_remote(target: &Path, url: &str, host: &dyn Host) -> RemoteMaterialized {
    if !needs_write(target) {
        tracing::debug!(path = %target.display(), "already present; skipping fetch");
        return RemoteMaterialized::AlreadyPresent;
    }
    let content = match host.fetch_text(url) {
        Ok(content) => content,
        Err(err) => {
            let reason = format!("{err:#}");
            tracing::warn!(path = %target.display(), url, reason = %reason, "document fetch failed");
            return RemoteMaterialized::FetchFailed(reason);
        }
    };
    match write_new(target, &content) {
        Ok(Materialized::Created) => RemoteMaterialized::Created,
        Ok(Materialized::AlreadyPresent) => RemoteMaterialized::AlreadyPresent,
        Err(err) => {
            let reason = format!("{err:#}");
            tracing::warn!(path = %target.display(), reason = %reason, "document write failed");
            RemoteMaterialized::WriteFailed(reason)
        }
    }
}

fn write_new(target: &Path, content: &str) -> Result<Materialized> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Ok(Materialized::AlreadyPresent)
        }
        Err(err) => return Err(err).with_context(|| format!("create {}", target.display())),
    };
    file.write_all(content.as_bytes())
        .with_context(|| format!("write {}", target.display()))?;
    tracing::info!(path = %target.display(), bytes = content.len(), "wrote default file");
    Ok(Materialized::Created)
}
