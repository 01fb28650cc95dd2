use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once per process.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            tracing::info!("Prometheus metrics initialized");
            handle
        }
        Err(e) => {
            // Another recorder owns the global slot; render a detached one.
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            PrometheusBuilder::new().build_recorder().handle()
        }
    });
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record a completed provider call and its latency.
pub fn record_provider_call(operation: &str, model: &str, status: &str, duration_secs: f64) {
    let labels = [
        ("operation", operation.to_string()),
        ("model", model.to_string()),
        ("status", status.to_string()),
    ];
    counter!("genai_provider_requests_total", &labels).increment(1);
    histogram!(
        "genai_provider_latency_seconds",
        "operation" => operation.to_string(),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Record a provider error.
pub fn record_provider_error(operation: &str, error_type: &str) {
    counter!(
        "genai_provider_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record token usage reported by the provider.
pub fn record_tokens(model: &str, input_tokens: u32, output_tokens: u32) {
    counter!(
        "genai_tokens_total",
        "model" => model.to_string(),
        "direction" => "input"
    )
    .increment(u64::from(input_tokens));
    counter!(
        "genai_tokens_total",
        "model" => model.to_string(),
        "direction" => "output"
    )
    .increment(u64::from(output_tokens));
}
