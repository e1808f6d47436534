//! Failure taxonomy shared by the pipeline stages.
//!
//! Plumbing errors (I/O, spawn, parse) travel as `anyhow::Error`; the variants
//! here are the outcomes the sequencer applies stage policy to.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// OS family or CPU architecture outside the supported set.
    #[error("unsupported platform: {os}/{arch} (supported: macos or linux on x86_64 or arm64)")]
    UnsupportedPlatform { os: String, arch: String },

    /// Every install strategy for a dependency was tried and none succeeded.
    #[error("could not install {dependency}: all strategies failed ({})", .attempts.join("; "))]
    InstallExhausted {
        dependency: String,
        attempts: Vec<String>,
    },

    /// The background service could not be confirmed running.
    #[error("service launch failed: {reason}")]
    LaunchFailed { reason: String },
}
