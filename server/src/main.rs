// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # TALLY Server
//!
//! Entry point for the `tally-server` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the ledger database, and
//! serves the REST API plus a Prometheus metrics endpoint.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the API server
//! - `status`  — query a running server's health endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use tally_ledger::config::MAINTENANCE_SWEEP_INTERVAL;
use tally_ledger::store::LedgerDb;

use cli::{Commands, TallyServerCli};
use metrics::ServerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TallyServerCli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full server: API listener, metrics listener, and the
/// background maintenance sweep.
async fn run_server(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "tally_server=info,tally_ledger=info,tower_http=debug",
        args.log_format,
    );

    tracing::info!(
        http_port = args.http_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting tally-server"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = Arc::new(
        LedgerDb::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(
        path = %db_path.display(),
        users = db.user_count(),
        transactions = db.transaction_count(),
        "database opened"
    );

    // --- Metrics ---
    let server_metrics = Arc::new(ServerMetrics::new());

    // --- Application state ---
    let app_state = api::AppState::new(Arc::clone(&db), Arc::clone(&server_metrics));

    // --- Maintenance sweep ---
    // Evicts stale throttle entries and expired sessions so neither map
    // grows with every identity ever seen, and keeps the gauges honest.
    let sweep_state = app_state.clone();
    let sweep_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;

            let stale_entries = sweep_state.throttle.sweep_expired();
            let expired_sessions = sweep_state.sessions.sweep_expired();
            sweep_state
                .metrics
                .active_sessions
                .set(sweep_state.sessions.active_sessions() as i64);
            sweep_state
                .metrics
                .throttled_identities
                .set(sweep_state.throttle.tracked_identities() as i64);

            if stale_entries > 0 || expired_sessions > 0 {
                tracing::debug!(stale_entries, expired_sessions, "maintenance sweep");
            }
        }
    });

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.http_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&server_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sweep_loop.abort();
    db.flush().context("failed to flush database on shutdown")?;
    tracing::info!("tally-server stopped");
    Ok(())
}

/// Queries a running server's `/health` endpoint and prints the body.
///
/// Speaks raw HTTP/1.1 over a TCP stream — pulling in a full HTTP
/// client for one GET would be the heaviest dependency in the binary.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let trimmed = args.url.trim_end_matches('/');
    let authority = trimmed.strip_prefix("http://").unwrap_or(trimmed);
    let authority = authority.split('/').next().unwrap_or(authority);
    let host = authority.split(':').next().unwrap_or(authority);
    let addr = if authority.contains(':') {
        authority.to_string()
    } else {
        format!("{authority}:80")
    };

    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!("GET /health HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_else(|| response.to_string());

    println!("{}", body.trim());
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("tally-server {}", env!("CARGO_PKG_VERSION"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
