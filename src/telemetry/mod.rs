//! Telemetry initialization: structured logging and metrics

pub mod metrics;

use crate::config::TelemetryConfig;
use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset; `mesto_api` also covers the request and error records
pub const DEFAULT_LOG_FILTER: &str = "mesto_api=info,tower_http=info";

/// Initialise logging and, when `METRICS_ADDR` is set, the Prometheus recorder.
///
/// Returns the recorder handle so the server can expose it on the metrics listener.
pub fn init(config: &TelemetryConfig) -> Result<Option<PrometheusHandle>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let prometheus_handle = match &config.metrics_addr {
        Some(_) => {
            let handle = metrics::install_prometheus_recorder()?;
            metrics::describe_metrics();
            Some(handle)
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_format == "json" {
        // Flatten event fields so `message` and the request fields are top-level
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true);
        registry.with(fmt_layer).try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    Ok(prometheus_handle)
}
