//! The fixed bootstrap pipeline.
//!
//! Stages run strictly in order. Each reports a [`BootstrapResult`]; the
//! stage's [`StagePolicy`] decides whether a failed result ends the run.
//! Every stage is safe to re-run because each one detects before it acts.
use crate::config::{BootstrapConfig, DependencySpec};
use crate::dependency::Dependency;
use crate::error::BootstrapError;
use crate::host::Host;
use crate::inference::{bootstrap_inference, InferenceOutcome};
use crate::launch::{ensure_running, open_endpoint, report_endpoint, ServiceCommands, ServiceState};
use crate::materialize::Materialized;
use crate::paths::InstallPaths;
use crate::platform::{self, Platform};
use crate::reconcile::{apply, reconcile, Applied, InstalledState};
use crate::resolver::resolve;
use crate::util::display_path;
use anyhow::{anyhow, Result};
use std::fmt;
use std::time::Instant;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Probing,
    ResolvingRuntime,
    ResolvingFramework,
    ResolvingPlugin,
    BootstrappingInference,
    ConfiguringWorkspace,
    Launching,
}

/// What a failed result does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Stop with `Failed(stage)`.
    Fatal,
    /// Record the failure and move on.
    Continue,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Probing,
        Stage::ResolvingRuntime,
        Stage::ResolvingFramework,
        Stage::ResolvingPlugin,
        Stage::BootstrappingInference,
        Stage::ConfiguringWorkspace,
        Stage::Launching,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Probing => "probing",
            Stage::ResolvingRuntime => "resolving_runtime",
            Stage::ResolvingFramework => "resolving_framework",
            Stage::ResolvingPlugin => "resolving_plugin",
            Stage::BootstrappingInference => "bootstrapping_inference",
            Stage::ConfiguringWorkspace => "configuring_workspace",
            Stage::Launching => "launching",
        }
    }

    /// Human label for progress lines and the summary.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Probing => "Platform",
            Stage::ResolvingRuntime => "Runtime",
            Stage::ResolvingFramework => "Framework",
            Stage::ResolvingPlugin => "Plugin",
            Stage::BootstrappingInference => "Inference",
            Stage::ConfiguringWorkspace => "Workspace",
            Stage::Launching => "Launch",
        }
    }

    pub fn policy(&self) -> StagePolicy {
        match self {
            Stage::Probing | Stage::ResolvingRuntime | Stage::ResolvingFramework => {
                StagePolicy::Fatal
            }
            _ => StagePolicy::Continue,
        }
    }

    /// The following stage; `None` after `Launching` (the run is done).
    pub fn next(&self) -> Option<Stage> {
        let index = Stage::ALL.iter().position(|stage| stage == self)?;
        Stage::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Degraded,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Degraded => "degraded",
            Outcome::Failed => "failed",
        }
    }
}

/// Outcome of one stage for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapResult {
    pub stage: Stage,
    pub outcome: Outcome,
    pub detail: String,
    /// Next-step guidance for degraded or failed stages.
    pub hint: Option<String>,
}

impl BootstrapResult {
    fn ok(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            outcome: Outcome::Ok,
            detail: detail.into(),
            hint: None,
        }
    }

    fn degraded(stage: Stage, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            stage,
            outcome: Outcome::Degraded,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn failed(stage: Stage, detail: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            stage,
            outcome: Outcome::Failed,
            detail: detail.into(),
            hint,
        }
    }
}

/// Where the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Done,
    Failed(Stage),
}

/// Aggregated results of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub results: Vec<BootstrapResult>,
    pub terminal: Terminal,
    pub platform: Option<Platform>,
    /// Chat endpoint, when the service is running.
    pub endpoint: Option<String>,
    /// Command to start the service by hand, when launch failed.
    pub manual_start: Option<String>,
}

impl RunSummary {
    pub fn completed(&self) -> bool {
        self.terminal == Terminal::Done
    }

    /// Non-ok stages on a run that still reached `Done`.
    pub fn degraded_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome != Outcome::Ok)
            .count()
    }

    #[cfg(test)]
    pub fn result(&self, stage: Stage) -> Option<&BootstrapResult> {
        self.results.iter().find(|result| result.stage == stage)
    }
}

type Prober = fn() -> Result<Platform, BootstrapError>;

/// Per-run values produced by earlier stages.
#[derive(Debug, Default)]
struct RunContext {
    platform: Option<Platform>,
    endpoint: Option<String>,
    manual_start: Option<String>,
}

impl RunContext {
    fn platform(&self) -> Result<Platform> {
        self.platform
            .ok_or_else(|| anyhow!("platform was not probed"))
    }
}

pub struct Sequencer<'a> {
    host: &'a dyn Host,
    config: &'a BootstrapConfig,
    paths: &'a InstallPaths,
    prober: Prober,
    progress: bool,
}

impl<'a> Sequencer<'a> {
    pub fn new(host: &'a dyn Host, config: &'a BootstrapConfig, paths: &'a InstallPaths) -> Self {
        Self {
            host,
            config,
            paths,
            prober: platform::probe,
            progress: false,
        }
    }

    /// Replace the platform probe.
    #[cfg(test)]
    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = prober;
        self
    }

    /// Print a line per stage to stderr as the run progresses.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self) -> RunSummary {
        let mut context = RunContext::default();
        let mut results = Vec::with_capacity(Stage::ALL.len());
        let mut current = Some(Stage::Probing);
        let mut terminal = Terminal::Done;

        while let Some(stage) = current {
            if self.progress {
                eprintln!("==> {}", stage.label());
            }
            let start = Instant::now();
            let result = self
                .run_stage(stage, &mut context)
                .unwrap_or_else(|err| BootstrapResult::failed(stage, format!("{err:#}"), None));
            tracing::info!(
                stage = stage.as_str(),
                outcome = result.outcome.as_str(),
                elapsed_ms = start.elapsed().as_millis(),
                "stage finished"
            );
            if self.progress {
                eprintln!("    {}: {}", result.outcome.as_str(), result.detail);
            }
            let fatal = result.outcome == Outcome::Failed && stage.policy() == StagePolicy::Fatal;
            results.push(result);
            if fatal {
                terminal = Terminal::Failed(stage);
                break;
            }
            current = stage.next();
        }

        RunSummary {
            results,
            terminal,
            platform: context.platform,
            endpoint: context.endpoint,
            manual_start: context.manual_start,
        }
    }

    fn run_stage(&self, stage: Stage, context: &mut RunContext) -> Result<BootstrapResult> {
        match stage {
            Stage::Probing => Ok(self.probe(context)),
            Stage::ResolvingRuntime => self.resolve_required(stage, &self.config.runtime, context),
            Stage::ResolvingFramework => {
                self.resolve_required(stage, &self.config.framework, context)
            }
            Stage::ResolvingPlugin => self.resolve_plugin(context),
            Stage::BootstrappingInference => self.bootstrap_inference(),
            Stage::ConfiguringWorkspace => self.configure_workspace(),
            Stage::Launching => self.launch(context),
        }
    }

    fn probe(&self, context: &mut RunContext) -> BootstrapResult {
        match (self.prober)() {
            Ok(platform) => {
                context.platform = Some(platform);
                BootstrapResult::ok(Stage::Probing, platform.to_string())
            }
            Err(err) => BootstrapResult::failed(
                Stage::Probing,
                err.to_string(),
                Some("run on macOS or Linux (x86_64 or arm64)".to_string()),
            ),
        }
    }

    fn resolve_required(
        &self,
        stage: Stage,
        spec: &DependencySpec,
        context: &RunContext,
    ) -> Result<BootstrapResult> {
        let platform = context.platform()?;
        let mut dependency = Dependency::from_spec(spec, self.paths)?;
        match resolve(&mut dependency, self.host, &platform) {
            Ok(resolution) => {
                tracing::debug!(dependency = %dependency.name, state = %dependency.state, "resolved");
                Ok(BootstrapResult::ok(
                    stage,
                    resolution.describe(&dependency.name),
                ))
            }
            Err(err) => Ok(BootstrapResult::failed(
                stage,
                err.to_string(),
                Some(manual_install_hint(spec)),
            )),
        }
    }

    fn resolve_plugin(&self, context: &RunContext) -> Result<BootstrapResult> {
        let stage = Stage::ResolvingPlugin;
        let platform = context.platform()?;
        let spec = &self.config.plugin;
        let mut dependency = Dependency::from_spec(spec, self.paths)?;
        let location = dependency
            .location
            .clone()
            .unwrap_or_else(|| self.paths.plugin_dir().to_path_buf());

        let mut notes = Vec::new();
        let mut update_failed = false;
        if let Some(state) = InstalledState::read(&location, &self.config.reconcile)? {
            let action = reconcile(&state, &self.config.reconcile);
            tracing::info!(
                dependency = %dependency.name,
                path = %state.location.display(),
                action = action.as_str(),
                "reconciled existing install"
            );
            match apply(action, &location, self.host)? {
                Applied::Untouched => {}
                Applied::Updated => notes.push("updated in place".to_string()),
                Applied::UpdateFailed(reason) => {
                    notes.push(format!("update failed ({reason}); kept present revision"));
                    update_failed = true;
                }
                Applied::Removed => {
                    notes.push("removed unexpected content for reinstall".to_string());
                }
            }
        }

        let result = match resolve(&mut dependency, self.host, &platform) {
            Ok(resolution) => {
                notes.push(resolution.describe(&dependency.name));
                let detail = notes.join("; ");
                if update_failed {
                    BootstrapResult::degraded(
                        stage,
                        detail,
                        format!(
                            "update {} by hand with `git -C {} pull`",
                            dependency.name,
                            location.display()
                        ),
                    )
                } else {
                    BootstrapResult::ok(stage, detail)
                }
            }
            Err(err) => {
                notes.push(err.to_string());
                BootstrapResult::failed(stage, notes.join("; "), Some(manual_install_hint(spec)))
            }
        };
        Ok(result)
    }

    fn bootstrap_inference(&self) -> Result<BootstrapResult> {
        let stage = Stage::BootstrappingInference;
        let runtime_config = self.paths.runtime_config();
        let outcome = bootstrap_inference(
            self.host,
            self.paths.inference_script(),
            runtime_config,
            &self.config.inference,
        )?;
        Ok(match outcome {
            InferenceOutcome::Configured => {
                BootstrapResult::ok(stage, "configured by bootstrap script")
            }
            InferenceOutcome::Fallback { reason, config } => {
                let shown = display_path(runtime_config, Some(self.paths.home()));
                let written = match config {
                    Materialized::Created => format!("wrote default config {shown}"),
                    Materialized::AlreadyPresent => format!("kept existing config {shown}"),
                };
                BootstrapResult::degraded(
                    stage,
                    format!("{reason}; {written}"),
                    format!(
                        "default models: {}; re-run once the plugin is installed to enable its inference",
                        self.config.inference.fallback_models.join(", ")
                    ),
                )
            }
        })
    }

    fn configure_workspace(&self) -> Result<BootstrapResult> {
        let stage = Stage::ConfiguringWorkspace;
        let report =
            crate::workspace::configure_workspace(self.host, self.paths, &self.config.documents)?;
        let failed = report.failed_documents();
        if failed.is_empty() {
            return Ok(BootstrapResult::ok(stage, report.summary()));
        }
        Ok(BootstrapResult::degraded(
            stage,
            report.summary(),
            format!(
                "the framework will use built-in defaults for {}",
                failed.join(", ")
            ),
        ))
    }

    fn launch(&self, context: &mut RunContext) -> Result<BootstrapResult> {
        let stage = Stage::Launching;
        let commands = ServiceCommands::from_spec(&self.config.service)?;
        match ensure_running(self.host, &commands) {
            Ok(state) => {
                let endpoint = report_endpoint(self.host, &commands);
                open_endpoint(self.host, &endpoint);
                let detail = match state {
                    ServiceState::AlreadyRunning => "service already running",
                    ServiceState::Started => "service started",
                };
                context.endpoint = Some(endpoint);
                Ok(BootstrapResult::ok(stage, detail))
            }
            Err(err) => {
                let manual = commands.start.display();
                context.manual_start = Some(manual.clone());
                Ok(BootstrapResult::failed(
                    stage,
                    err.to_string(),
                    Some(format!("start the service manually with `{manual}`")),
                ))
            }
        }
    }
}

fn manual_install_hint(spec: &DependencySpec) -> String {
    match &spec.min_version {
        Some(min) => format!("install {} {min} or newer manually, then re-run", spec.name),
        None => format!("install {} manually, then re-run", spec.name),
    }
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;
