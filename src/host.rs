//! Side-effecting calls to the machine: child processes, program lookup,
//! HTTP fetches, and the platform URL handler.
//!
//! Every stage goes through [`Host`] so the pipeline can be driven against a
//! scripted host in tests.
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Bound on how long a single document or installer fetch may take.
const FETCH_TIMEOUT_SECS: u64 = 60;

/// Bytes of child output kept in log lines.
const LOG_OUTPUT_BYTES: usize = 400;

/// A child process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Split a command line with shell quoting rules.
    pub fn parse(line: &str) -> Result<Self> {
        let mut words =
            shell_words::split(line).with_context(|| format!("parse command: {line}"))?;
        if words.is_empty() {
            return Err(anyhow!("command is empty"));
        }
        let program = words.remove(0);
        Ok(Self::new(program).args(words))
    }

    /// `bash -c <script>`.
    pub fn shell(script: &str) -> Self {
        Self::new("bash").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Render as a copy-pasteable shell line.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was killed by a signal.
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Stdout followed by stderr; version strings land on either.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }

    /// Short failure description for logs and stage details.
    pub fn failure_summary(&self) -> String {
        let status = match self.status_code {
            Some(code) => format!("exit {code}"),
            None => "killed by signal".to_string(),
        };
        let detail = self.stderr.trim();
        if detail.is_empty() {
            status
        } else {
            let last_line = detail.lines().next_back().unwrap_or(detail);
            format!("{status}: {}", truncate_string(last_line, 200))
        }
    }
}

/// The machine the pipeline acts on.
pub trait Host {
    /// Run a command to completion. Err means it could not be started.
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;

    /// Locate a program on the (augmented) search path.
    fn find_program(&self, name: &str) -> Option<PathBuf>;

    /// Fetch a URL as text; non-2xx responses are errors.
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Hand a URL to the platform's default handler.
    fn open_url(&self, url: &str) -> Result<()>;
}

/// [`Host`] backed by the real OS.
pub struct SystemHost {
    search_path: OsString,
    agent: ureq::Agent,
}

impl SystemHost {
    /// Build a host whose children see `extra_path` ahead of the inherited `PATH`.
    pub fn new(extra_path: &[PathBuf]) -> Result<Self> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs: Vec<PathBuf> = extra_path
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited))
            .collect();
        let search_path = std::env::join_paths(dirs).context("build child PATH")?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(FETCH_TIMEOUT_SECS)))
            .build()
            .into();
        Ok(Self { search_path, agent })
    }

    fn resolve_program(&self, program: &str) -> PathBuf {
        if program.contains('/') {
            return PathBuf::from(program);
        }
        self.find_program(program)
            .unwrap_or_else(|| PathBuf::from(program))
    }
}

impl Host for SystemHost {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let program = self.resolve_program(&command.program);
        let mut child_command = Command::new(&program);
        child_command
            .args(&command.args)
            .env("PATH", &self.search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &command.cwd {
            child_command.current_dir(cwd);
        }

        let start = Instant::now();
        let output = child_command
            .output()
            .with_context(|| format!("spawn {}", command.program))?;

        let result = CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(
            command = %command.display(),
            status = ?result.status_code,
            elapsed_ms = start.elapsed().as_millis(),
            stderr = %truncate_string(result.stderr.trim(), LOG_OUTPUT_BYTES),
            "command finished"
        );
        Ok(result)
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which::which_in(name, Some(&self.search_path), cwd).ok()
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let mut response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("fetch {url}"))?;
        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("read body of {url}"))?;
        tracing::debug!(
            url,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "fetch complete"
        );
        Ok(body)
    }

    fn open_url(&self, url: &str) -> Result<()> {
        open::that_detached(url).with_context(|| format!("open {url}"))
    }
}

/// True when `requirement` is satisfied: a path that exists, or a program on
/// the host's search path.
pub fn requirement_present(host: &dyn Host, requirement: &Path) -> bool {
    if requirement.components().count() > 1 || requirement.is_absolute() {
        return requirement.exists();
    }
    requirement
        .to_str()
        .and_then(|name| host.find_program(name))
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_quoted_words() {
        let spec = CommandSpec::parse("openclaw dashboard --label 'my chat'").expect("parse");
        assert_eq!(spec.program, "openclaw");
        assert_eq!(spec.args, vec!["dashboard", "--label", "my chat"]);
        assert_eq!(spec.display(), "openclaw dashboard --label 'my chat'");
    }

    #[test]
    fn parse_rejects_empty_line() {
        assert!(CommandSpec::parse("   ").is_err());
    }

    #[test]
    fn combined_joins_streams() {
        let output = CommandOutput {
            status_code: Some(0),
            stdout: "v22.3.0".to_string(),
            stderr: "warning".to_string(),
        };
        assert_eq!(output.combined(), "v22.3.0\nwarning");
    }

    #[test]
    fn failure_summary_uses_last_stderr_line() {
        let output = CommandOutput {
            status_code: Some(2),
            stdout: String::new(),
            stderr: "resolving\nnetwork unreachable\n".to_string(),
        };
        assert_eq!(output.failure_summary(), "exit 2: network unreachable");
    }

    #[test]
    fn system_host_runs_commands_and_reports_exit_codes() {
        let host = SystemHost::new(&[]).expect("host");
        let ok = host
            .run(&CommandSpec::shell("printf hello"))
            .expect("run bash");
        assert!(ok.success());
        assert_eq!(ok.stdout, "hello");

        let failed = host
            .run(&CommandSpec::shell("echo oops >&2; exit 3"))
            .expect("run bash");
        assert_eq!(failed.status_code, Some(3));
        assert_eq!(failed.failure_summary(), "exit 3: oops");
    }

    #[test]
    fn system_host_honors_cwd() {
        let temp = tempfile::tempdir().expect("tempdir");
        let host = SystemHost::new(&[]).expect("host");
        let output = host
            .run(&CommandSpec::new("pwd").cwd(temp.path()))
            .expect("run pwd");
        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().expect("canonical pwd"),
            temp.path().canonicalize().expect("canonical temp")
        );
    }

    #[test]
    fn system_host_spawn_failure_is_an_error() {
        let host = SystemHost::new(&[]).expect("host");
        assert!(host
            .run(&CommandSpec::new("definitely-not-a-real-program-4711"))
            .is_err());
    }

    #[test]
    fn requirement_present_checks_paths_and_programs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = temp.path().join("nvm.sh");
        let host = SystemHost::new(&[]).expect("host");
        assert!(!requirement_present(&host, &marker));
        std::fs::write(&marker, "").expect("write marker");
        assert!(requirement_present(&host, &marker));
        assert!(requirement_present(&host, Path::new("bash")));
        assert!(!requirement_present(
            &host,
            Path::new("definitely-not-a-real-program-4711")
        ));
    }
}
