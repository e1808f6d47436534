//! CLI argument parsing.
//!
//! The bootstrap takes no behavioral flags; clap only provides `--help` and
//! `--version`. Behavior is tuned through the config file instead.
use clap::Parser;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "claw-bootstrap",
    version,
    about = "Install, configure and launch the OpenClaw agent runtime",
    after_help = "Stages:\n  platform -> runtime (node) -> framework (openclaw) -> plugin (everclaw)\n  -> inference -> workspace -> launch\n\nRe-running is safe: installed tools are detected and existing files are never overwritten.\n\nEnvironment:\n  CLAW_BOOTSTRAP_CONFIG  Path to a JSON config file (default: <config dir>/claw-bootstrap/config.json)\n  RUST_LOG               Diagnostic log filter (default: warn)"
)]
pub struct RootArgs {}
