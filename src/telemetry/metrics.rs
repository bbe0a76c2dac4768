//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::info;

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    // Latency buckets (seconds), with sub-millisecond resolution for in-memory routes
    let buckets = vec![
        0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup.
pub fn describe_metrics() {
    describe_counter!("mesto_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "mesto_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "mesto_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!("mesto_auth_login_total", "Login attempts by result");
    describe_counter!(
        "mesto_auth_failures_total",
        "Rejected credentials on protected routes, by reason"
    );
    describe_counter!(
        "mesto_rate_limit_throttled_total",
        "Total number of rate-limited requests"
    );

    counter!("mesto_auth_login_total", "result" => "success").absolute(0);
    counter!("mesto_auth_login_total", "result" => "failure").absolute(0);
    counter!("mesto_auth_failures_total", "reason" => "missing_credential").absolute(0);
    counter!("mesto_rate_limit_throttled_total").absolute(0);
    gauge!("mesto_http_requests_in_flight").set(0.0);
}

/// Serve `GET /metrics` on its own listener, outside the request pipeline
pub async fn serve(addr: String, handle: PrometheusHandle) -> Result<()> {
    let app = Router::new().route("/metrics", get(move || std::future::ready(handle.render())));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
    info!("Metrics listener started on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
