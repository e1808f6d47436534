//! Background service launch and endpoint discovery.
use crate::config::ServiceSpec;
use crate::error::BootstrapError;
use crate::host::{CommandSpec, Host};
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Compiled service commands and status patterns.
#[derive(Debug, Clone)]
pub struct ServiceCommands {
    pub status: CommandSpec,
    pub start: CommandSpec,
    pub url: CommandSpec,
    pub default_url: String,
    running: Regex,
    stopped: Regex,
}

/// How the service came to be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    AlreadyRunning,
    Started,
}

impl ServiceCommands {
    pub fn from_spec(spec: &ServiceSpec) -> Result<Self> {
        Ok(Self {
            status: CommandSpec::parse(&spec.status_command)?,
            start: CommandSpec::parse(&spec.start_command)?,
            url: CommandSpec::parse(&spec.url_command)?,
            default_url: spec.default_url.clone(),
            running: Regex::new(&spec.running_pattern)
                .with_context(|| format!("compile pattern {}", spec.running_pattern))?,
            stopped: Regex::new(&spec.stopped_pattern)
                .with_context(|| format!("compile pattern {}", spec.stopped_pattern))?,
        })
    }

    /// Classify status output. Stopped wording wins, so "not running" is
    /// never read as running.
    pub fn is_running(&self, status_output: &str) -> bool {
        !self.stopped.is_match(status_output) && self.running.is_match(status_output)
    }

    fn query_running(&self, host: &dyn Host) -> bool {
        match host.run(&self.status) {
            Ok(output) if output.success() => self.is_running(&output.combined()),
            Ok(output) => {
                tracing::debug!(failure = %output.failure_summary(), "service status query failed");
                false
            }
            Err(err) => {
                tracing::debug!(error = %err, "service status unavailable");
                false
            }
        }
    }
}

/// Make sure the service is up, starting it once if needed.
pub fn ensure_running(
    host: &dyn Host,
    commands: &ServiceCommands,
) -> Result<ServiceState, BootstrapError> {
    if commands.query_running(host) {
        tracing::info!("service already running");
        return Ok(ServiceState::AlreadyRunning);
    }
    let start_failure = match host.run(&commands.start) {
        Ok(output) if output.success() => None,
        Ok(output) => Some(output.failure_summary()),
        Err(err) => Some(format!("{err:#}")),
    };
    if commands.query_running(host) {
        tracing::info!("service started");
        return Ok(ServiceState::Started);
    }
    let reason = match start_failure {
        Some(failure) => format!("`{}` failed ({failure})", commands.start.display()),
        None => format!(
            "`{}` did not report running after `{}`",
            commands.status.display(),
            commands.start.display()
        ),
    };
    Err(BootstrapError::LaunchFailed { reason })
}

/// Query the chat endpoint, falling back to the configured default URL.
pub fn report_endpoint(host: &dyn Host, commands: &ServiceCommands) -> String {
    let queried = match host.run(&commands.url) {
        Ok(output) if output.success() => extract_url(&output.combined()),
        Ok(output) => {
            tracing::debug!(failure = %output.failure_summary(), "endpoint query failed");
            None
        }
        Err(err) => {
            tracing::debug!(error = %err, "endpoint query unavailable");
            None
        }
    };
    queried.unwrap_or_else(|| commands.default_url.clone())
}

/// Hand the endpoint to the platform URL handler. Failures are only logged.
pub fn open_endpoint(host: &dyn Host, url: &str) {
    if let Err(err) = host.open_url(url) {
        tracing::debug!(url, error = %err, "could not open endpoint");
    }
}

/// First `http://` or `https://` URL in `text`.
pub fn extract_url(text: &str) -> Option<String> {
    static URL: OnceLock<Regex> = OnceLock::new();
    let pattern =
        URL.get_or_init(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("static url regex"));
    pattern
        .find(text)
        .map(|found| found.as_str().trim_end_matches(['.', ',', ')']).to_string())
}
