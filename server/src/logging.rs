//! # Structured Logging
//!
//! Initializes the `tracing` subscriber with a configurable format
//! (JSON or pretty-printed) and environment-based filtering via
//! `RUST_LOG`.
//!
//! All log output goes to stderr so stdout stays available for
//! structured data (e.g., `status` output piped into `jq`).

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format, selectable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output. Suitable for local development.
    Pretty,
    /// Machine-parseable JSON lines. Suitable for log aggregation.
    Json,
}

/// Initialize the global tracing subscriber.
///
/// Call this exactly once, early in `main()`. Subsequent calls will
/// panic.
///
/// # Arguments
///
/// * `default_level` - The filter used when `RUST_LOG` is not set.
///   Typical values: `"info"`, `"tally_server=debug,tally_ledger=info"`.
/// * `format` - Output format.
///
/// # Environment
///
/// `RUST_LOG` overrides `default_level` when set, using the usual
/// `tracing_subscriber::EnvFilter` directive syntax.
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_target(true))
                .init();
        }
    }

    tracing::info!("logging initialized (format={:?})", format);
}
