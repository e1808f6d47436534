use anyhow::{anyhow, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod dependency;
mod error;
mod host;
mod inference;
mod launch;
mod materialize;
mod paths;
mod platform;
mod reconcile;
mod report;
mod resolver;
mod sequencer;
mod strategy;
#[cfg(test)]
mod testing;
mod util;
mod workspace;

use crate::cli::RootArgs;
use crate::host::SystemHost;
use crate::paths::InstallPaths;
use crate::sequencer::Sequencer;

fn main() -> ExitCode {
    let _args = RootArgs::parse();
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run() -> Result<ExitCode> {
    let config = config::load_config()?;
    let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
    let paths = InstallPaths::resolve(&home, &config);
    tracing::debug!(
        framework_root = %paths.framework_root().display(),
        workspace = %paths.workspace_dir().display(),
        plugin = %paths.plugin_dir().display(),
        "resolved install paths"
    );
    let host = SystemHost::new(paths.extra_path())?;

    let summary = Sequencer::new(&host, &config, &paths)
        .with_progress(true)
        .run();
    println!("{}", report::render_summary(&summary));
    Ok(if summary.completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
