//! Bootstrap configuration.
//!
//! The managed dependency table, the install strategies for each dependency,
//! and the impostor signatures are data. Built-in defaults cover the stock
//! setup; a JSON file can override any section.
use crate::platform::OsFamily;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CLAW_BOOTSTRAP_CONFIG";

const CONFIG_DIR_NAME: &str = "claw-bootstrap";
const CONFIG_FILE_NAME: &str = "config.json";

const PLUGIN_LOCATION: &str = "~/.openclaw/workspace/skills/everclaw";
const PLUGIN_REPOSITORY: &str = "https://github.com/EverClaw/everclaw.git";
const DOCUMENT_BASE_URL: &str = "https://raw.githubusercontent.com/EverClaw/everclaw/main/templates";
const NVM_INSTALLER_URL: &str = "https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.3/install.sh";
const NVM_INSTALL_SCRIPT: &str = "export NVM_SYMLINK_CURRENT=true; . \"$HOME/.nvm/nvm.sh\" && nvm install {version_major} && nvm alias default {version_major} && nvm use default";

/// Top-level config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub schema_version: u32,
    /// Root directory owned by the agent framework.
    pub framework_root: String,
    /// Workspace holding persona/convention documents and memory.
    pub workspace_dir: String,
    /// Directories prepended to `PATH` for every child process.
    pub extra_path: Vec<String>,
    pub runtime: DependencySpec,
    pub framework: DependencySpec,
    pub plugin: DependencySpec,
    pub reconcile: ReconcileSpec,
    pub inference: InferenceSpec,
    pub documents: Vec<DocumentSpec>,
    pub service: ServiceSpec,
}

/// One managed dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencySpec {
    pub name: String,
    /// Minimum acceptable version; `None` accepts any detected version.
    #[serde(default)]
    pub min_version: Option<String>,
    pub detect: DetectSpec,
    /// Install location for dependencies that live at a fixed path.
    #[serde(default)]
    pub location: Option<String>,
    pub strategies: Vec<StrategySpec>,
}

/// How presence and version of a dependency are detected.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectSpec {
    /// Run a command and parse a version from its output.
    Command { command: String },
    /// The dependency's `location` exists.
    Location,
}

/// One install strategy, optionally restricted to some OS families.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategySpec {
    pub label: String,
    /// OS families this strategy applies to; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<OsFamily>,
    #[serde(flatten)]
    pub method: StrategyMethod,
}

/// Install methods. String fields accept `{name}`, `{version}`,
/// `{version_major}` and `{location}` placeholders.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyMethod {
    /// Run a bash script, optionally only when a program or file is present.
    Shell {
        script: String,
        #[serde(default)]
        requires: Option<String>,
    },
    /// Fetch an installer script, run it with bash, then run an optional
    /// follow-up script.
    InstallerScript {
        url: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        then: Option<String>,
    },
    /// Install a package from a package index (e.g. `npm install -g`).
    PackageIndex {
        manager: String,
        package: String,
        #[serde(default = "default_package_index_args")]
        args: Vec<String>,
    },
    /// Clone a repository into the dependency's location.
    GitClone {
        repository: String,
        #[serde(default)]
        branch: Option<String>,
    },
}

fn default_package_index_args() -> Vec<String> {
    vec!["install".to_string(), "-g".to_string()]
}

/// Rules for inspecting an existing plugin location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileSpec {
    /// Entry whose presence marks a source-control checkout.
    pub vcs_marker: String,
    /// File whose text is matched against impostor signatures.
    pub marker_file: String,
    /// Substrings identifying a same-named package of different origin.
    pub impostor_signatures: Vec<String>,
}

/// Inference bootstrap script and the local fallback config.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceSpec {
    pub script: String,
    /// Runtime-defaults config written when the script is absent or fails.
    pub runtime_config: String,
    pub provider: String,
    pub base_url: String,
    pub api: String,
    pub fallback_models: Vec<String>,
}

/// A workspace document fetched into the workspace root when absent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DocumentSpec {
    pub name: String,
    pub url: String,
}

/// Background service commands exposed by the agent framework.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub status_command: String,
    pub start_command: String,
    pub url_command: String,
    pub default_url: String,
    /// Status output pattern meaning the service is up.
    pub running_pattern: String,
    /// Status output pattern meaning the service is down; checked first.
    pub stopped_pattern: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        default_config()
    }
}

impl Default for ReconcileSpec {
    fn default() -> Self {
        Self {
            vcs_marker: ".git".to_string(),
            marker_file: "SKILL.md".to_string(),
            impostor_signatures: vec!["Everclaw Vault".to_string()],
        }
    }
}

impl Default for InferenceSpec {
    fn default() -> Self {
        Self {
            script: format!("{PLUGIN_LOCATION}/scripts/bootstrap.sh"),
            runtime_config: "~/.openclaw/openclaw.json".to_string(),
            provider: "everclaw".to_string(),
            base_url: "http://127.0.0.1:8083/v1".to_string(),
            api: "openai-completions".to_string(),
            fallback_models: vec!["kimi-k2.5".to_string(), "glm-4.7-flash".to_string()],
        }
    }
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            status_command: "openclaw gateway status".to_string(),
            start_command: "openclaw gateway start".to_string(),
            url_command: "openclaw dashboard --no-open".to_string(),
            default_url: "http://127.0.0.1:18789/".to_string(),
            running_pattern: r"(?i)\b(running|active)\b".to_string(),
            stopped_pattern: r"(?i)\b(not running|inactive|stopped|dead)\b".to_string(),
        }
    }
}

/// Build the built-in config used when no file overrides it.
pub fn default_config() -> BootstrapConfig {
    BootstrapConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        framework_root: "~/.openclaw".to_string(),
        workspace_dir: "~/.openclaw/workspace".to_string(),
        extra_path: vec![
            "~/.openclaw/bin".to_string(),
            "~/.local/share/fnm/aliases/default/bin".to_string(),
            "~/Library/Application Support/fnm/aliases/default/bin".to_string(),
            "~/.nvm/current/bin".to_string(),
            "~/.npm-global/bin".to_string(),
            "~/.local/bin".to_string(),
        ],
        runtime: default_runtime(),
        framework: default_framework(),
        plugin: default_plugin(),
        reconcile: ReconcileSpec::default(),
        inference: InferenceSpec::default(),
        documents: default_documents(),
        service: ServiceSpec::default(),
    }
}

fn default_runtime() -> DependencySpec {
    DependencySpec {
        name: "node".to_string(),
        min_version: Some("22.0.0".to_string()),
        detect: DetectSpec::Command {
            command: "node --version".to_string(),
        },
        location: None,
        strategies: vec![
            StrategySpec {
                label: "fnm".to_string(),
                platforms: Vec::new(),
                method: StrategyMethod::Shell {
                    script: "fnm install {version_major} && fnm default {version_major}"
                        .to_string(),
                    requires: Some("fnm".to_string()),
                },
            },
            StrategySpec {
                label: "nvm".to_string(),
                platforms: Vec::new(),
                method: StrategyMethod::Shell {
                    script: NVM_INSTALL_SCRIPT.to_string(),
                    requires: Some("~/.nvm/nvm.sh".to_string()),
                },
            },
            StrategySpec {
                label: "nvm-bootstrap".to_string(),
                platforms: Vec::new(),
                method: StrategyMethod::InstallerScript {
                    url: NVM_INSTALLER_URL.to_string(),
                    args: Vec::new(),
                    then: Some(NVM_INSTALL_SCRIPT.to_string()),
                },
            },
        ],
    }
}

fn default_framework() -> DependencySpec {
    DependencySpec {
        name: "openclaw".to_string(),
        min_version: None,
        detect: DetectSpec::Command {
            command: "openclaw --version".to_string(),
        },
        location: None,
        strategies: vec![
            StrategySpec {
                label: "official-installer".to_string(),
                platforms: Vec::new(),
                method: StrategyMethod::InstallerScript {
                    url: "https://openclaw.ai/install.sh".to_string(),
                    args: vec!["--no-onboard".to_string()],
                    then: None,
                },
            },
            StrategySpec {
                label: "npm".to_string(),
                platforms: Vec::new(),
                method: StrategyMethod::PackageIndex {
                    manager: "npm".to_string(),
                    package: "openclaw@latest".to_string(),
                    args: default_package_index_args(),
                },
            },
        ],
    }
}

fn default_plugin() -> DependencySpec {
    DependencySpec {
        name: "everclaw".to_string(),
        min_version: None,
        detect: DetectSpec::Location,
        location: Some(PLUGIN_LOCATION.to_string()),
        strategies: vec![StrategySpec {
            label: "git-clone".to_string(),
            platforms: Vec::new(),
            method: StrategyMethod::GitClone {
                repository: PLUGIN_REPOSITORY.to_string(),
                branch: None,
            },
        }],
    }
}

fn default_documents() -> Vec<DocumentSpec> {
    ["SOUL.md", "AGENTS.md"]
        .into_iter()
        .map(|name| DocumentSpec {
            name: name.to_string(),
            url: format!("{DOCUMENT_BASE_URL}/{name}"),
        })
        .collect()
}

/// Resolve the config file location: explicit env path, then the user config dir.
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the config from its resolved location, or defaults when absent.
pub fn load_config() -> Result<BootstrapConfig> {
    let config = match config_path() {
        Some(path) if path.is_file() => load_config_from(&path)?,
        _ => default_config(),
    };
    validate_config(&config)?;
    Ok(config)
}

/// Load a config file; missing sections fall back to defaults.
pub fn load_config_from(path: &Path) -> Result<BootstrapConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: BootstrapConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Reject configs the pipeline cannot run with.
pub fn validate_config(config: &BootstrapConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {} (expected {})",
            config.schema_version,
            CONFIG_SCHEMA_VERSION
        ));
    }
    for dependency in [&config.runtime, &config.framework, &config.plugin] {
        validate_dependency(dependency)?;
    }
    if config.plugin.location.is_none() {
        return Err(anyhow!("plugin `{}` requires a location", config.plugin.name));
    }
    if config.inference.fallback_models.is_empty() {
        return Err(anyhow!("inference.fallback_models must not be empty"));
    }
    for pattern in [
        &config.service.running_pattern,
        &config.service.stopped_pattern,
    ] {
        Regex::new(pattern).with_context(|| format!("compile service pattern {pattern}"))?;
    }
    for command in [
        &config.service.status_command,
        &config.service.start_command,
        &config.service.url_command,
    ] {
        parse_command_words(command)?;
    }
    Ok(())
}

fn validate_dependency(spec: &DependencySpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(anyhow!("dependency name must not be empty"));
    }
    if let Some(min) = &spec.min_version {
        crate::dependency::parse_version(min)
            .ok_or_else(|| anyhow!("invalid min_version `{min}` for {}", spec.name))?;
    }
    if spec.strategies.is_empty() {
        return Err(anyhow!("dependency {} has no install strategies", spec.name));
    }
    if let DetectSpec::Command { command } = &spec.detect {
        parse_command_words(command)?;
    }
    let needs_location = spec.detect == DetectSpec::Location
        || spec
            .strategies
            .iter()
            .any(|strategy| matches!(strategy.method, StrategyMethod::GitClone { .. }));
    if needs_location && spec.location.is_none() {
        return Err(anyhow!("dependency {} requires a location", spec.name));
    }
    Ok(())
}

fn parse_command_words(command: &str) -> Result<Vec<String>> {
    let words =
        shell_words::split(command).with_context(|| format!("parse command: {command}"))?;
    if words.is_empty() {
        return Err(anyhow!("command is empty"));
    }
    Ok(words)
}
