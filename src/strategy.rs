//! Install strategies.
//!
//! Each configured strategy becomes a boxed [`InstallStrategy`]; the resolver
//! tries them in declared order and stops at the first success. Strategies
//! have no state of their own and are never rolled back.
use crate::config::{StrategyMethod, StrategySpec};
use crate::host::{requirement_present, CommandSpec, Host};
use crate::paths::InstallPaths;
use crate::platform::{OsFamily, Platform};
use anyhow::{anyhow, Context, Result};
use semver::Version;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Success,
    Failure(String),
}

/// One way of installing a dependency.
pub trait InstallStrategy: fmt::Debug {
    fn label(&self) -> &str;

    fn attempt(&self, host: &dyn Host, platform: &Platform) -> StrategyOutcome;
}

/// Values substituted into strategy templates.
#[derive(Debug, Clone)]
pub struct TemplateValues {
    name: String,
    version: String,
    version_major: String,
    location: String,
}

impl TemplateValues {
    pub fn new(name: &str, min_version: Option<&Version>, location: Option<&Path>) -> Self {
        Self {
            name: name.to_string(),
            version: min_version
                .map(Version::to_string)
                .unwrap_or_else(|| "latest".to_string()),
            version_major: min_version
                .map(|v| v.major.to_string())
                .unwrap_or_else(|| "latest".to_string()),
            location: location
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn render(&self, template: &str) -> String {
        template
            .replace("{name}", &self.name)
            .replace("{version_major}", &self.version_major)
            .replace("{version}", &self.version)
            .replace("{location}", &self.location)
    }
}

/// Build the strategy chain for one dependency, in declared order.
pub fn build_strategies(
    specs: &[StrategySpec],
    values: &TemplateValues,
    paths: &InstallPaths,
    location: Option<&Path>,
) -> Result<Vec<Box<dyn InstallStrategy>>> {
    specs
        .iter()
        .map(|spec| build_strategy(spec, values, paths, location))
        .collect()
}

fn build_strategy(
    spec: &StrategySpec,
    values: &TemplateValues,
    paths: &InstallPaths,
    location: Option<&Path>,
) -> Result<Box<dyn InstallStrategy>> {
    let label = spec.label.clone();
    let strategy: Box<dyn InstallStrategy> = match &spec.method {
        StrategyMethod::Shell { script, requires } => Box::new(ShellStrategy {
            label,
            script: values.render(script),
            requires: requires.as_deref().map(|raw| paths.expand(raw)),
        }),
        StrategyMethod::InstallerScript { url, args, then } => Box::new(InstallerScriptStrategy {
            label,
            url: values.render(url),
            args: args.iter().map(|arg| values.render(arg)).collect(),
            then: then.as_deref().map(|script| values.render(script)),
        }),
        StrategyMethod::PackageIndex {
            manager,
            package,
            args,
        } => Box::new(PackageIndexStrategy {
            label,
            manager: manager.clone(),
            package: values.render(package),
            args: args.iter().map(|arg| values.render(arg)).collect(),
        }),
        StrategyMethod::GitClone { repository, branch } => Box::new(GitCloneStrategy {
            label,
            repository: values.render(repository),
            branch: branch.clone(),
            destination: location
                .map(Path::to_path_buf)
                .ok_or_else(|| anyhow!("git_clone strategy `{}` needs a location", spec.label))?,
        }),
    };
    if spec.platforms.is_empty() {
        return Ok(strategy);
    }
    Ok(Box::new(PlatformGate {
        platforms: spec.platforms.clone(),
        inner: strategy,
    }))
}

/// Run one command and map its result to an outcome.
fn run_step(host: &dyn Host, command: &CommandSpec) -> StrategyOutcome {
    match host.run(command) {
        Ok(output) if output.success() => StrategyOutcome::Success,
        Ok(output) => StrategyOutcome::Failure(output.failure_summary()),
        Err(err) => StrategyOutcome::Failure(format!("{err:#}")),
    }
}

/// Restricts a strategy to some OS families; elsewhere it fails without running.
#[derive(Debug)]
struct PlatformGate {
    platforms: Vec<OsFamily>,
    inner: Box<dyn InstallStrategy>,
}

impl InstallStrategy for PlatformGate {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn attempt(&self, host: &dyn Host, platform: &Platform) -> StrategyOutcome {
        if !self.platforms.contains(&platform.os) {
            return StrategyOutcome::Failure(format!("not available on {}", platform.os));
        }
        self.inner.attempt(host, platform)
    }
}

/// `bash -c <script>`, skipped when its required program or file is missing.
#[derive(Debug)]
struct ShellStrategy {
    label: String,
    script: String,
    requires: Option<PathBuf>,
}

impl InstallStrategy for ShellStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    fn attempt(&self, host: &dyn Host, _platform: &Platform) -> StrategyOutcome {
        if let Some(requirement) = &self.requires {
            if !requirement_present(host, requirement) {
                return StrategyOutcome::Failure(format!("{} not found", requirement.display()));
            }
        }
        run_step(host, &CommandSpec::shell(&self.script))
    }
}

/// Fetch an installer, run it with bash, then an optional follow-up script.
#[derive(Debug)]
struct InstallerScriptStrategy {
    label: String,
    url: String,
    args: Vec<String>,
    then: Option<String>,
}

impl InstallerScriptStrategy {
    fn run_installer(&self, host: &dyn Host, script: &str) -> Result<StrategyOutcome> {
        let mut file = tempfile::Builder::new()
            .prefix("claw-installer-")
            .suffix(".sh")
            .tempfile()
            .context("create installer temp file")?;
        file.write_all(script.as_bytes())
            .context("write installer script")?;
        file.flush().context("flush installer script")?;
        let command = CommandSpec::new("bash")
            .arg(file.path().display().to_string())
            .args(self.args.iter().cloned());
        Ok(run_step(host, &command))
    }
}

impl InstallStrategy for InstallerScriptStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    fn attempt(&self, host: &dyn Host, _platform: &Platform) -> StrategyOutcome {
        let script = match host.fetch_text(&self.url) {
            Ok(script) => script,
            Err(err) => return StrategyOutcome::Failure(format!("{err:#}")),
        };
        match self.run_installer(host, &script) {
            Ok(StrategyOutcome::Success) => {}
            Ok(failure) => return failure,
            Err(err) => return StrategyOutcome::Failure(format!("{err:#}")),
        }
        match &self.then {
            Some(follow_up) => run_step(host, &CommandSpec::shell(follow_up)),
            None => StrategyOutcome::Success,
        }
    }
}

/// `<manager> <args...> <package>`, e.g. `npm install -g openclaw@latest`.
#[derive(Debug)]
struct PackageIndexStrategy {
    label: String,
    manager: String,
    package: String,
    args: Vec<String>,
}

impl InstallStrategy for PackageIndexStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    fn attempt(&self, host: &dyn Host, _platform: &Platform) -> StrategyOutcome {
        if host.find_program(&self.manager).is_none() {
            return StrategyOutcome::Failure(format!("{} not found", self.manager));
        }
        let command = CommandSpec::new(self.manager.as_str())
            .args(self.args.iter().cloned())
            .arg(self.package.as_str());
        run_step(host, &command)
    }
}

/// Shallow clone of a repository into the dependency location.
#[derive(Debug)]
struct GitCloneStrategy {
    label: String,
    repository: String,
    branch: Option<String>,
    destination: PathBuf,
}

impl InstallStrategy for GitCloneStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    fn attempt(&self, host: &dyn Host, _platform: &Platform) -> StrategyOutcome {
        if host.find_program("git").is_none() {
            return StrategyOutcome::Failure("git not found".to_string());
        }
        if self.destination.exists() {
            return StrategyOutcome::Failure(format!(
                "{} already exists",
                self.destination.display()
            ));
        }
        if let Some(parent) = self.destination.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                return StrategyOutcome::Failure(format!("create {}: {err}", parent.display()));
            }
        }
        let mut command = CommandSpec::new("git").args(["clone", "--depth", "1"]);
        if let Some(branch) = &self.branch {
            command = command.arg("--branch").arg(branch.as_str());
        }
        let command = command
            .arg(self.repository.as_str())
            .arg(self.destination.display().to_string());
        run_step(host, &command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::host::CommandOutput;
    use crate::platform::{classify, Arch};
    use crate::testing::FakeHost;

    fn linux() -> Platform {
        classify("linux", "x86_64").expect("linux")
    }

    fn paths() -> InstallPaths {
        InstallPaths::resolve(Path::new("/home/dev"), &default_config())
    }

    fn values() -> TemplateValues {
        let min = Version::new(22, 0, 0);
        TemplateValues::new("node", Some(&min), None)
    }

    fn single(spec: StrategySpec) -> Box<dyn InstallStrategy> {
        let mut built = build_strategies(&[spec], &values(), &paths(), None).expect("build");
        built.remove(0)
    }

    #[test]
    fn template_values_substitute_placeholders() {
        let min = Version::new(22, 4, 1);
        let values = TemplateValues::new("node", Some(&min), Some(Path::new("/opt/node")));
        assert_eq!(
            values.render("{name}@{version} major={version_major} at {location}"),
            "node@22.4.1 major=22 at /opt/node"
        );
        let any = TemplateValues::new("openclaw", None, None);
        assert_eq!(any.render("{name}@{version_major}"), "openclaw@latest");
    }

    #[test]
    fn shell_strategy_fails_fast_when_requirement_missing() {
        let host = FakeHost::new();
        let strategy = single(StrategySpec {
            label: "fnm".to_string(),
            platforms: Vec::new(),
            method: StrategyMethod::Shell {
                script: "fnm install {version_major}".to_string(),
                requires: Some("fnm".to_string()),
            },
        });
        assert_eq!(
            strategy.attempt(&host, &linux()),
            StrategyOutcome::Failure("fnm not found".to_string())
        );
        assert!(host.calls().is_empty());

        host.add_program("fnm");
        host.on("fnm install 22", |_| Ok(CommandOutput::ok("")));
        assert_eq!(strategy.attempt(&host, &linux()), StrategyOutcome::Success);
        assert_eq!(host.calls(), vec!["bash -c 'fnm install 22'"]);
    }

    #[test]
    fn platform_gate_skips_other_os_families() {
        let host = FakeHost::new();
        host.add_program("brew");
        host.on("brew install", |_| Ok(CommandOutput::ok("")));
        let strategy = single(StrategySpec {
            label: "brew".to_string(),
            platforms: vec![OsFamily::Macos],
            method: StrategyMethod::Shell {
                script: "brew install node@{version_major}".to_string(),
                requires: Some("brew".to_string()),
            },
        });

        assert_eq!(
            strategy.attempt(&host, &linux()),
            StrategyOutcome::Failure("not available on linux".to_string())
        );
        assert!(host.calls().is_empty());

        let mac = Platform {
            os: OsFamily::Macos,
            arch: Arch::Arm64,
        };
        assert_eq!(strategy.attempt(&host, &mac), StrategyOutcome::Success);
    }

    #[test]
    fn installer_script_runs_fetched_script_then_follow_up() {
        let host = FakeHost::new();
        host.serve("https://example.test/install.sh", "echo installing");
        host.on("claw-installer-", |_| Ok(CommandOutput::ok("installed")));
        host.on("nvm install 22", |_| Ok(CommandOutput::ok("")));
        let strategy = single(StrategySpec {
            label: "nvm-bootstrap".to_string(),
            platforms: Vec::new(),
            method: StrategyMethod::InstallerScript {
                url: "https://example.test/install.sh".to_string(),
                args: Vec::new(),
                then: Some("nvm install {version_major}".to_string()),
            },
        });

        assert_eq!(strategy.attempt(&host, &linux()), StrategyOutcome::Success);
        let calls = host.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("bash "));
        assert!(calls[0].contains("claw-installer-"));
        assert_eq!(calls[1], "bash -c 'nvm install 22'");
    }

    #[test]
    fn installer_script_fetch_failure_is_strategy_failure() {
        let host = FakeHost::new();
        let strategy = single(StrategySpec {
            label: "official-installer".to_string(),
            platforms: Vec::new(),
            method: StrategyMethod::InstallerScript {
                url: "https://example.test/missing.sh".to_string(),
                args: Vec::new(),
                then: None,
            },
        });
        match strategy.attempt(&host, &linux()) {
            StrategyOutcome::Failure(reason) => assert!(reason.contains("missing.sh")),
            StrategyOutcome::Success => panic!("fetch failure must not succeed"),
        }
        assert!(host.calls().is_empty());
    }

    #[test]
    fn package_index_requires_manager_and_reports_exit_status() {
        let host = FakeHost::new();
        let strategy = single(StrategySpec {
            label: "npm".to_string(),
            platforms: Vec::new(),
            method: StrategyMethod::PackageIndex {
                manager: "npm".to_string(),
                package: "openclaw@latest".to_string(),
                args: vec!["install".to_string(), "-g".to_string()],
            },
        });
        assert_eq!(
            strategy.attempt(&host, &linux()),
            StrategyOutcome::Failure("npm not found".to_string())
        );

        host.add_program("npm");
        host.on("npm install -g openclaw@latest", |_| {
            Ok(CommandOutput::exit(243, "EACCES: permission denied"))
        });
        assert_eq!(
            strategy.attempt(&host, &linux()),
            StrategyOutcome::Failure("exit 243: EACCES: permission denied".to_string())
        );
    }

    #[test]
    fn git_clone_targets_location_and_refuses_existing_destination() {
        let temp = tempfile::tempdir().expect("tempdir");
        let destination = temp.path().join("skills").join("everclaw");
        let host = FakeHost::new();
        host.add_program("git");
        host.on("git clone", |_| Ok(CommandOutput::ok("")));
        let values = TemplateValues::new("everclaw", None, Some(&destination));
        let spec = StrategySpec {
            label: "git-clone".to_string(),
            platforms: Vec::new(),
            method: StrategyMethod::GitClone {
                repository: "https://example.test/everclaw.git".to_string(),
                branch: Some("main".to_string()),
            },
        };
        let strategy = build_strategies(&[spec], &values, &paths(), Some(&destination))
            .expect("build")
            .remove(0);

        assert_eq!(strategy.attempt(&host, &linux()), StrategyOutcome::Success);
        assert!(temp.path().join("skills").is_dir());
        assert_eq!(
            host.calls(),
            vec![format!(
                "git clone --depth 1 --branch main https://example.test/everclaw.git {}",
                destination.display()
            )]
        );

        fs::create_dir_all(&destination).expect("create destination");
        assert!(matches!(
            strategy.attempt(&host, &linux()),
            StrategyOutcome::Failure(_)
        ));
    }

    #[test]
    fn git_clone_without_location_is_a_build_error() {
        let spec = StrategySpec {
            label: "git-clone".to_string(),
            platforms: Vec::new(),
            method: StrategyMethod::GitClone {
                repository: "https://example.test/x.git".to_string(),
                branch: None,
            },
        };
        assert!(build_strategies(&[spec], &values(), &paths(), None).is_err());
    }
}
