//! Reconciliation of an existing plugin location before install or update.
//!
//! Reading the location ([`InstalledState::read`]), deciding
//! ([`reconcile`]) and acting ([`apply`]) are separate so the decision rules
//! can be tested against plain values.
use crate::config::ReconcileSpec;
use crate::host::{CommandSpec, Host};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// What was found at an existing location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledState {
    pub location: PathBuf,
    /// A source-control checkout marker (e.g. `.git`) is present.
    pub has_vcs_marker: bool,
    /// Text of the marker file, when present and readable as UTF-8.
    pub marker_text: Option<String>,
}

/// Decision for an existing location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Leave the content untouched.
    NoOp,
    /// Pull the latest revision in place.
    UpdateInPlace,
    /// Delete the location so the caller reinstalls it.
    Recreate,
}

impl ReconcileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileAction::NoOp => "no_op",
            ReconcileAction::UpdateInPlace => "update_in_place",
            ReconcileAction::Recreate => "recreate",
        }
    }
}

/// Effect of applying a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Untouched,
    Updated,
    /// The pull failed; the present revision is kept.
    UpdateFailed(String),
    Removed,
}

impl InstalledState {
    /// Inspect `location`; `None` when nothing exists there. Symlinks are
    /// not followed; a file or symlink never carries markers.
    pub fn read(location: &Path, rules: &ReconcileSpec) -> Result<Option<Self>> {
        let metadata = match fs::symlink_metadata(location) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("inspect {}", location.display()))
            }
        };
        if !metadata.is_dir() {
            return Ok(Some(Self {
                location: location.to_path_buf(),
                has_vcs_marker: false,
                marker_text: None,
            }));
        }
        let marker_text = fs::read(location.join(&rules.marker_file))
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        Ok(Some(Self {
            location: location.to_path_buf(),
            has_vcs_marker: location.join(&rules.vcs_marker).exists(),
            marker_text,
        }))
    }
}

/// Decide what to do with an existing location.
///
/// A source-control checkout is updated in place and content carrying an
/// impostor signature is recreated. Anything else is user content and is
/// left alone.
pub fn reconcile(state: &InstalledState, rules: &ReconcileSpec) -> ReconcileAction {
    if state.has_vcs_marker {
        return ReconcileAction::UpdateInPlace;
    }
    if let Some(text) = &state.marker_text {
        if matches_impostor(text, &rules.impostor_signatures) {
            return ReconcileAction::Recreate;
        }
    }
    ReconcileAction::NoOp
}

/// Substring match of marker text against known-bad signatures.
pub fn matches_impostor(text: &str, signatures: &[String]) -> bool {
    signatures
        .iter()
        .filter(|signature| !signature.is_empty())
        .any(|signature| text.contains(signature.as_str()))
}

/// Carry out `action` on `location`. Update failures are reported, not raised.
pub fn apply(action: ReconcileAction, location: &Path, host: &dyn Host) -> Result<Applied> {
    match action {
        ReconcileAction::NoOp => Ok(Applied::Untouched),
        ReconcileAction::UpdateInPlace => {
            let command = CommandSpec::new("git")
                .args(["pull", "--ff-only"])
                .cwd(location);
            let failure = match host.run(&command) {
                Ok(output) if output.success() => return Ok(Applied::Updated),
                Ok(output) => output.failure_summary(),
                Err(err) => format!("{err:#}"),
            };
            tracing::warn!(
                path = %location.display(),
                reason = %failure,
                "update in place failed; keeping present revision"
            );
            Ok(Applied::UpdateFailed(failure))
        }
        ReconcileAction::Recreate => {
            let metadata = fs::symlink_metadata(location)
                .with_context(|| format!("inspect {}", location.display()))?;
            if metadata.is_dir() {
                fs::remove_dir_all(location)
                    .with_context(|| format!("remove {}", location.display()))?;
            } else {
                fs::remove_file(location)
                    .with_context(|| format!("remove {}", location.display()))?;
            }
            tracing::info!(path = %location.display(), "removed location for reinstall");
            Ok(Applied::Removed)
        }
    }
}
