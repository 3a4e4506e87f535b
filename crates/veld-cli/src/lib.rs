//! # veld-cli
//!
//! Command-line interface for the veld satellite imagery service.
//!
//! ## Commands
//!
//! - `veld api` - Serve the HTTP API
//! - `veld worker` - Run one event worker plus the periodic observer
//!
//! ## Configuration
//!
//! Settings come from the environment; see [`config::Config`] for the keys.
//! Both commands exit nonzero when startup configuration or connections
//! fail.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod commands;
pub mod config;

use clap::{Args, Parser, Subcommand};

/// veld - satellite imagery boundary maps.
#[derive(Debug, Parser)]
#[command(name = "veld")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API.
    Api(ApiArgs),
    /// Run one event worker plus the periodic observer.
    Worker(WorkerArgs),
}

/// Arguments for `veld api`.
#[derive(Debug, Args)]
pub struct ApiArgs {
    /// Instance name, for logs only.
    #[arg(long)]
    pub name: Option<String>,

    /// Listen port.
    #[arg(long, default_value_t = 7000)]
    pub port: u16,
}

/// Arguments for `veld worker`.
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Instance name, for logs only.
    #[arg(long)]
    pub name: Option<String>,
}
