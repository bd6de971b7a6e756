//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG: &str = "robolog.json5";

/// Command line of the bridge binary.
#[derive(Parser, Debug, Clone)]
#[command(about = "robolog Zenoh bridge")]
pub struct BridgeArgs {
    /// Path to configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override the run mode the loop starts in.
    #[arg(long)]
    pub mode: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments, falling back to `default_config` when `--config` is absent.
    ///
    /// Exits the process with clap's usage message on invalid input.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config))
            .get_matches();

        <Self as clap::FromArgMatches>::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}
