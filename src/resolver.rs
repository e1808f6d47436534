//! Dependency resolution: detect first, then walk the strategy chain.
//!
//! Each strategy runs at most once per call and the first success ends the
//! walk. Failed strategies leave whatever they changed in place; a below-minimum
//! install is never removed, the new install upgrades or shadows it.
use crate::dependency::{Dependency, DependencyState};
use crate::error::BootstrapError;
use crate::host::Host;
use crate::platform::Platform;
use crate::strategy::StrategyOutcome;
use std::time::Instant;

/// How a dependency ended up satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Detected at an acceptable version; no strategy ran.
    AlreadySatisfied { state: DependencyState },
    /// Installed by `strategy`, the `attempts`-th strategy tried.
    Installed {
        strategy: String,
        attempts: usize,
        replaced: Option<DependencyState>,
    },
}

impl Resolution {
    pub fn describe(&self, name: &str) -> String {
        match self {
            Resolution::AlreadySatisfied { state } => format!("{name} already {state}"),
            Resolution::Installed {
                strategy,
                attempts,
                replaced,
            } => {
                let mut text = format!("{name} installed via {strategy}");
                if *attempts > 1 {
                    text.push_str(&format!(" after {} failed attempt(s)", attempts - 1));
                }
                if let Some(DependencyState::BelowMinimum { found }) = replaced {
                    text.push_str(&format!(" (upgraded from {found})"));
                }
                text
            }
        }
    }
}

/// Ensure `dependency` is satisfied, installing it if needed.
pub fn resolve(
    dependency: &mut Dependency,
    host: &dyn Host,
    platform: &Platform,
) -> Result<Resolution, BootstrapError> {
    let detected = dependency.detect(host);
    dependency.state = detected.clone();
    if detected.is_satisfied() {
        tracing::info!(dependency = %dependency.name, state = %detected, "already satisfied");
        return Ok(Resolution::AlreadySatisfied { state: detected });
    }
    if let DependencyState::BelowMinimum { found } = &detected {
        tracing::warn!(
            dependency = %dependency.name,
            found = %found,
            minimum = ?dependency.min_version.as_ref().map(ToString::to_string),
            "installed version below minimum; installing alongside"
        );
    }

    let mut failures = Vec::new();
    let mut installed_by = None;
    for (index, strategy) in dependency.strategies.iter().enumerate() {
        let start = Instant::now();
        tracing::info!(dependency = %dependency.name, strategy = strategy.label(), "attempting install");
        match strategy.attempt(host, platform) {
            StrategyOutcome::Success => {
                tracing::info!(
                    dependency = %dependency.name,
                    strategy = strategy.label(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "install succeeded"
                );
                installed_by = Some((strategy.label().to_string(), index + 1));
                break;
            }
            StrategyOutcome::Failure(reason) => {
                tracing::warn!(
                    dependency = %dependency.name,
                    strategy = strategy.label(),
                    reason = %reason,
                    "install strategy failed"
                );
                failures.push(format!("{}: {reason}", strategy.label()));
            }
        }
    }

    if let Some((strategy, attempts)) = installed_by {
        confirm_install(dependency, host);
        return Ok(Resolution::Installed {
            strategy,
            attempts,
            replaced: (detected != DependencyState::Absent).then_some(detected),
        });
    }
    Err(BootstrapError::InstallExhausted {
        dependency: dependency.name.clone(),
        attempts: failures,
    })
}

/// Record the post-install state. A successful strategy is authoritative even
/// when the new install is not yet visible to a fresh probe (e.g. a shell
/// profile change that only applies to new shells).
fn confirm_install(dependency: &mut Dependency, host: &dyn Host) {
    let after = dependency.detect(host);
    if after.is_satisfied() {
        dependency.state = after;
        return;
    }
    tracing::warn!(
        dependency = %dependency.name,
        detected = %after,
        "install reported success but detection does not confirm it yet"
    );
    dependency.state = DependencyState::Satisfied { version: None };
}
