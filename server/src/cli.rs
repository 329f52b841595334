//! # CLI Interface
//!
//! Defines the command-line argument structure for `tally-server` using
//! `clap` derive. Supports three subcommands: `run`, `status`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tally_ledger::config::{DEFAULT_HTTP_PORT, DEFAULT_METRICS_PORT};

use crate::logging::LogFormat;

/// TALLY accounts & transfers server.
///
/// Serves the REST API for user accounts and peer-to-peer balance
/// transfers, with login throttling, bearer-token sessions, and a
/// Prometheus metrics endpoint.
#[derive(Parser, Debug)]
#[command(
    name = "tally-server",
    about = "TALLY accounts & transfers server",
    version,
    propagate_version = true
)]
pub struct TallyServerCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the server binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the API server.
    Run(RunArgs),
    /// Query the health of a running server.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the data directory where the ledger database lives.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "TALLY_DATA_DIR", default_value = "~/.tally")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, env = "TALLY_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TALLY_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, env = "TALLY_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running server.
    #[arg(long, default_value = "http://127.0.0.1:8730")]
    pub url: String,
}
