//! Workspace layout: root, `memory/`, and the named persona/convention
//! documents.
use crate::config::DocumentSpec;
use crate::host::Host;
use crate::materialize::{materialize_remote, RemoteMaterialized};
use crate::paths::InstallPaths;
use crate::util::display_path;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Per-run record of what the workspace stage did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceReport {
    /// Directories this run created, shown home-relative.
    pub directories_created: Vec<String>,
    /// Document name and its outcome, in configured order.
    pub documents: Vec<(String, RemoteMaterialized)>,
}

impl WorkspaceReport {
    pub fn failed_documents(&self) -> Vec<&str> {
        self.documents
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome,
                    RemoteMaterialized::FetchFailed(_) | RemoteMaterialized::WriteFailed(_)
                )
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// One-line summary such as
    /// `created ~/.openclaw/workspace; SOUL.md created, AGENTS.md already present`.
    pub fn summary(&self) -> String {
        let documents = if self.documents.is_empty() {
            "no documents configured".to_string()
        } else {
            self.documents
                .iter()
                .map(|(name, outcome)| format!("{name} {}", outcome.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if self.directories_created.is_empty() {
            documents
        } else {
            format!("created {}; {documents}", self.directories_created.join(", "))
        }
    }
}

/// Create `path` if missing and report whether it was created; an existing
/// non-directory is an error.
pub fn ensure_directory(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_dir() {
            bail!("workspace path '{}' exists but is not a directory", path.display());
        }
        return Ok(false);
    }
    std::fs::create_dir_all(path)
        .with_context(|| format!("create directory {}", path.display()))?;
    tracing::info!(path = %path.display(), "created directory");
    Ok(true)
}

/// Ensure the workspace tree exists and fetch absent documents. Directory
/// failures are errors; document failures are recorded per document and the
/// remaining documents are still attempted.
pub fn configure_workspace(
    host: &dyn Host,
    paths: &InstallPaths,
    documents: &[DocumentSpec],
) -> Result<WorkspaceReport> {
    let mut report = WorkspaceReport::default();
    for dir in [paths.workspace_dir().to_path_buf(), paths.memory_dir()] {
        if ensure_directory(&dir)? {
            report
                .directories_created
                .push(display_path(&dir, Some(paths.home())));
        }
    }
    for document in documents {
        let target = paths.document_path(&document.name);
        let outcome = materialize_remote(&target, &document.url, host);
        report.documents.push((document.name.clone(), outcome));
    }
    Ok(report)
}
