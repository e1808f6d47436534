//! Managed dependencies and their detect-before-act checks.
//!
//! Detection is split into a side-effecting probe (`Dependency::detect`) and a
//! pure classifier (`assess_version`) so the version policy can be tested
//! without running anything.
use crate::config::{DependencySpec, DetectSpec};
use crate::host::{CommandSpec, Host};
use crate::paths::InstallPaths;
use crate::strategy::{build_strategies, InstallStrategy, TemplateValues};
use anyhow::{anyhow, Result};
use regex::Regex;
use semver::Version;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// What detection found for a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyState {
    Absent,
    BelowMinimum { found: Version },
    /// `version` is `None` for presence-only dependencies.
    Satisfied { version: Option<Version> },
}

impl DependencyState {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, DependencyState::Satisfied { .. })
    }
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyState::Absent => f.write_str("absent"),
            DependencyState::BelowMinimum { found } => write!(f, "below minimum ({found})"),
            DependencyState::Satisfied { version: Some(v) } => write!(f, "satisfied ({v})"),
            DependencyState::Satisfied { version: None } => f.write_str("satisfied"),
        }
    }
}

/// How a dependency is detected.
#[derive(Debug, Clone)]
pub enum Detector {
    /// Run a command; a version parsed from its output decides.
    Command(CommandSpec),
    /// Presence of a path decides.
    Location(PathBuf),
}

/// One managed dependency for the current run. Rebuilt from config every run.
#[derive(Debug)]
pub struct Dependency {
    pub name: String,
    pub min_version: Option<Version>,
    pub detector: Detector,
    pub location: Option<PathBuf>,
    pub strategies: Vec<Box<dyn InstallStrategy>>,
    pub state: DependencyState,
}

impl Dependency {
    pub fn from_spec(spec: &DependencySpec, paths: &InstallPaths) -> Result<Self> {
        let min_version = match &spec.min_version {
            Some(raw) => Some(
                parse_version(raw)
                    .ok_or_else(|| anyhow!("invalid min_version `{raw}` for {}", spec.name))?,
            ),
            None => None,
        };
        let location = spec.location.as_deref().map(|raw| paths.expand(raw));
        let detector = match &spec.detect {
            DetectSpec::Command { command } => Detector::Command(CommandSpec::parse(command)?),
            DetectSpec::Location => Detector::Location(
                location
                    .clone()
                    .ok_or_else(|| anyhow!("dependency {} has no location", spec.name))?,
            ),
        };
        let values = TemplateValues::new(&spec.name, min_version.as_ref(), location.as_deref());
        let strategies = build_strategies(&spec.strategies, &values, paths, location.as_deref())?;
        Ok(Self {
            name: spec.name.clone(),
            min_version,
            detector,
            location,
            strategies,
            state: DependencyState::Absent,
        })
    }

    /// Probe the machine. Spawn failures and non-zero exits read as absent.
    pub fn detect(&self, host: &dyn Host) -> DependencyState {
        match &self.detector {
            Detector::Location(path) => {
                if path.exists() {
                    DependencyState::Satisfied { version: None }
                } else {
                    DependencyState::Absent
                }
            }
            Detector::Command(command) => match host.run(command) {
                Ok(output) if output.success() => {
                    assess_version(&output.combined(), self.min_version.as_ref())
                }
                Ok(output) => {
                    tracing::debug!(
                        dependency = %self.name,
                        failure = %output.failure_summary(),
                        "detect command failed"
                    );
                    DependencyState::Absent
                }
                Err(err) => {
                    tracing::debug!(dependency = %self.name, error = %err, "detect command unavailable");
                    DependencyState::Absent
                }
            },
        }
    }
}

/// Classify detect-command output against an optional minimum.
///
/// Output without a recognizable version only satisfies a dependency that has
/// no minimum.
pub fn assess_version(output: &str, min: Option<&Version>) -> DependencyState {
    let found = parse_version(output);
    match (found, min) {
        (Some(found), Some(min)) if found < *min => DependencyState::BelowMinimum { found },
        (Some(found), _) => DependencyState::Satisfied {
            version: Some(found),
        },
        (None, None) => DependencyState::Satisfied { version: None },
        (None, Some(_)) => DependencyState::Absent,
    }
}

/// Extract the first `N`, `N.N` or `N.N.N` version (optional `v` prefix).
pub fn parse_version(text: &str) -> Option<Version> {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    let re = VERSION_RE.get_or_init(|| {
        Regex::new(r"\bv?(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid version regex")
    });
    let caps = re.captures(text)?;
    let part = |idx: usize| -> Option<u64> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}
