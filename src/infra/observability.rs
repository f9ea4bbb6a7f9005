//! Logging and Prometheus metrics.
//!
//! Metric names recorded by the credit service live here so the exporter and
//! the recording sites agree.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DEFAULT_LOG_FILTER, LogFormat};

/// Prometheus handle for on-demand scrape output (e.g. GET /metrics).
pub type PrometheusHandle = metrics_exporter_prometheus::PrometheusHandle;

pub const CREDITS_CREATED_TOTAL: &str = "credits_created_total";
pub const CREDITS_UPDATED_TOTAL: &str = "credits_updated_total";
pub const CREDITS_DELETED_TOTAL: &str = "credits_deleted_total";
pub const CREDIT_VALIDATION_FAILURES_TOTAL: &str = "credit_validation_failures_total";
pub const CREDITS_STORED: &str = "credits_stored";

/// Install the global metrics recorder and return a handle for rendering.
///
/// Uses `PrometheusBuilder` without an HTTP listener; the application
/// exposes metrics via GET /metrics using `handle.render()`.
///
/// # Errors
/// Returns an error if a recorder is already installed or building fails.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Convenience to wrap the handle in Arc for shared use in app state.
#[must_use]
pub fn init_metrics_handle() -> Option<Arc<PrometheusHandle>> {
    init_metrics().ok().map(Arc::new)
}

fn describe_metrics() {
    metrics::describe_counter!(CREDITS_CREATED_TOTAL, "Credit records created");
    metrics::describe_counter!(CREDITS_UPDATED_TOTAL, "Credit records updated");
    metrics::describe_counter!(CREDITS_DELETED_TOTAL, "Credit records deleted");
    metrics::describe_counter!(
        CREDIT_VALIDATION_FAILURES_TOTAL,
        "Credit payloads rejected by validation"
    );
    metrics::describe_gauge!(CREDITS_STORED, "Credit records currently stored");
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `DEFAULT_LOG_FILTER`. Calling this twice is a no-op
/// for the second call.
pub fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
