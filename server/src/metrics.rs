//! # Prometheus Metrics
//!
//! Operational metrics for the server, scraped at the `/metrics` HTTP
//! endpoint on the configured metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] so they do
//! not collide with any default global registry consumers. Every metric
//! declared here is actually recorded somewhere — decorative metrics
//! are worse than none, because dashboards trust them.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the server.
///
/// Clone-friendly (prometheus handles are internally reference-counted)
/// so it can be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct ServerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total login attempts, successful or not.
    pub logins_total: IntCounter,
    /// Failed login attempts (wrong credentials).
    pub login_failures_total: IntCounter,
    /// Login attempts refused by the throttle.
    pub login_lockouts_total: IntCounter,
    /// Transfers successfully applied.
    pub transfers_applied_total: IntCounter,
    /// Transfer attempts rejected by a business rule or store fault.
    pub transfers_rejected_total: IntCounter,
    /// Sessions currently live (set by the maintenance sweep).
    pub active_sessions: IntGauge,
    /// Identities currently tracked by the login throttle.
    pub throttled_identities: IntGauge,
}

impl ServerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("tally".into()), None)
            .expect("failed to create prometheus registry");

        let logins_total = IntCounter::new("logins_total", "Total login attempts")
            .expect("metric creation");
        registry
            .register(Box::new(logins_total.clone()))
            .expect("metric registration");

        let login_failures_total = IntCounter::new(
            "login_failures_total",
            "Login attempts that failed credential verification",
        )
        .expect("metric creation");
        registry
            .register(Box::new(login_failures_total.clone()))
            .expect("metric registration");

        let login_lockouts_total = IntCounter::new(
            "login_lockouts_total",
            "Login attempts refused by the throttle",
        )
        .expect("metric creation");
        registry
            .register(Box::new(login_lockouts_total.clone()))
            .expect("metric registration");

        let transfers_applied_total = IntCounter::new(
            "transfers_applied_total",
            "Transfers successfully applied to balances",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transfers_applied_total.clone()))
            .expect("metric registration");

        let transfers_rejected_total = IntCounter::new(
            "transfers_rejected_total",
            "Transfer attempts rejected before or during application",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transfers_rejected_total.clone()))
            .expect("metric registration");

        let active_sessions =
            IntGauge::new("active_sessions", "Sessions currently live").expect("metric creation");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("metric registration");

        let throttled_identities = IntGauge::new(
            "throttled_identities",
            "Identities currently tracked by the login throttle",
        )
        .expect("metric creation");
        registry
            .register(Box::new(throttled_identities.clone()))
            .expect("metric registration");

        Self {
            registry,
            logins_total,
            login_failures_total,
            login_lockouts_total,
            transfers_applied_total,
            transfers_rejected_total,
            active_sessions,
            throttled_identities,
        }
    }

    /// Encodes all registered metrics into the Prometheus text
    /// exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<ServerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
