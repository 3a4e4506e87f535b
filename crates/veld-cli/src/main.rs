//! `veld` binary entrypoint.
//!
//! Loads configuration from environment variables, initializes logging, and
//! dispatches to the selected subcommand. Exits nonzero on startup error.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use anyhow::Result;
use clap::Parser;

use veld_cli::config::Config;
use veld_cli::{Cli, Commands};
use veld_core::observability::{init_logging, LogFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_logging(if config.is_prod() {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Api(args) => veld_cli::commands::api::execute(args, &config).await,
            Commands::Worker(args) => veld_cli::commands::worker::execute(args, &config).await,
        }
    })
}
