//! Inference bootstrap: run the plugin's setup script, or fall back to a
//! local runtime-defaults config.
use crate::config::InferenceSpec;
use crate::host::{CommandSpec, Host};
use crate::materialize::{materialize, Materialized};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Instant;

/// How inference ended up configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceOutcome {
    /// The bootstrap script exited 0.
    Configured,
    /// The script was absent or failed; the local defaults file was
    /// materialized instead.
    Fallback {
        reason: String,
        config: Materialized,
    },
}

/// Run `script` with bash; on absence or non-zero exit, materialize the
/// runtime-defaults config at `runtime_config`.
pub fn bootstrap_inference(
    host: &dyn Host,
    script: &Path,
    runtime_config: &Path,
    spec: &InferenceSpec,
) -> Result<InferenceOutcome> {
    let reason = match run_script(host, script) {
        None => return Ok(InferenceOutcome::Configured),
        Some(reason) => reason,
    };
    tracing::warn!(
        script = %script.display(),
        reason = %reason,
        "inference bootstrap unavailable; writing local defaults"
    );
    let content = default_runtime_config(spec)?;
    let config = materialize(runtime_config, &content)?;
    Ok(InferenceOutcome::Fallback { reason, config })
}

/// `None` on success, otherwise why the script did not configure inference.
fn run_script(host: &dyn Host, script: &Path) -> Option<String> {
    if !script.is_file() {
        return Some(format!("bootstrap script not found at {}", script.display()));
    }
    let mut command = CommandSpec::new("bash").arg(script.display().to_string());
    if let Some(dir) = script.parent() {
        command = command.cwd(dir);
    }
    let start = Instant::now();
    let result = host.run(&command);
    tracing::info!(
        script = %script.display(),
        elapsed_ms = start.elapsed().as_millis(),
        "inference bootstrap finished"
    );
    match result {
        Ok(output) if output.success() => None,
        Ok(output) => Some(format!("bootstrap script failed ({})", output.failure_summary())),
        Err(err) => Some(format!("bootstrap script could not start: {err:#}")),
    }
}

/// Runtime-defaults document. `models.mode = "merge"` tells the framework to
/// overlay this provider onto its own defaults instead of replacing them.
pub fn default_runtime_config(spec: &InferenceSpec) -> Result<String> {
    let models: Vec<Value> = spec
        .fallback_models
        .iter()
        .map(|id| json!({ "id": id, "name": id }))
        .collect();
    let primary = spec
        .fallback_models
        .first()
        .map(|id| format!("{}/{id}", spec.provider));
    let mut providers = Map::new();
    providers.insert(
        spec.provider.clone(),
        json!({
            "baseUrl": spec.base_url,
            "api": spec.api,
            "models": models,
        }),
    );
    let mut document = json!({
        "models": {
            "mode": "merge",
            "providers": providers,
        }
    });
    if let Some(primary) = primary {
        document["agents"] = json!({ "defaults": { "model": { "primary": primary } } });
    }
    let mut text =
        serde_json::to_string_pretty(&document).context("serialize runtime defaults")?;
    text.push('\n');
    Ok(text)
}
