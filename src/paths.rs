//! Typed paths into the framework root and workspace.
//!
//! Config paths are strings with an optional `~/` prefix; everything else in
//! the crate works with the resolved absolute paths held here.
use crate::config::BootstrapConfig;
use std::path::{Path, PathBuf};

/// Resolved on-disk layout for one run.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    home: PathBuf,
    framework_root: PathBuf,
    workspace_dir: PathBuf,
    plugin_dir: PathBuf,
    inference_script: PathBuf,
    runtime_config: PathBuf,
    extra_path: Vec<PathBuf>,
}

impl InstallPaths {
    /// Resolve every configured path against `home`.
    pub fn resolve(home: &Path, config: &BootstrapConfig) -> Self {
        let plugin_dir = config
            .plugin
            .location
            .as_deref()
            .map(|raw| expand_home(raw, home))
            .unwrap_or_else(|| expand_home(&config.workspace_dir, home).join(&config.plugin.name));
        Self {
            home: home.to_path_buf(),
            framework_root: expand_home(&config.framework_root, home),
            workspace_dir: expand_home(&config.workspace_dir, home),
            plugin_dir,
            inference_script: expand_home(&config.inference.script, home),
            runtime_config: expand_home(&config.inference.runtime_config, home),
            extra_path: config
                .extra_path
                .iter()
                .map(|raw| expand_home(raw, home))
                .collect(),
        }
    }

    /// Return the home directory paths were resolved against.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Return the framework root (e.g. `~/.openclaw`).
    pub fn framework_root(&self) -> &Path {
        &self.framework_root
    }

    /// Return the workspace root.
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Return the `memory/` directory under the workspace.
    pub fn memory_dir(&self) -> PathBuf {
        self.workspace_dir.join("memory")
    }

    /// Return the path of a named workspace document.
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.workspace_dir.join(name)
    }

    /// Return the plugin install location.
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Return the inference bootstrap script path.
    pub fn inference_script(&self) -> &Path {
        &self.inference_script
    }

    /// Return the runtime-defaults config path.
    pub fn runtime_config(&self) -> &Path {
        &self.runtime_config
    }

    /// Return the extra directories prepended to child `PATH`.
    pub fn extra_path(&self) -> &[PathBuf] {
        &self.extra_path
    }

    /// Expand a config path string against this run's home directory.
    pub fn expand(&self, raw: &str) -> PathBuf {
        expand_home(raw, &self.home)
    }
}

/// Expand a leading `~` or `~/` against `home`; other paths pass through.
pub fn expand_home(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(raw),
    }
}
