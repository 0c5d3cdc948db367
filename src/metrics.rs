// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("notifier_cycles_total", "Check cycles started.");
        describe_counter!("notifier_sync_errors_total", "Failed repository syncs.");
        describe_counter!(
            "notifier_parse_errors_total",
            "Listings files that could not be parsed."
        );
        describe_counter!(
            "notifier_candidates_total",
            "Entries selected for delivery after diff and dedup."
        );
        describe_counter!(
            "notifier_delivered_total",
            "Entries accepted by at least one channel."
        );
        describe_counter!(
            "notifier_delivery_failures_total",
            "Entries rejected by every channel."
        );
        describe_counter!(
            "notifier_channel_disabled_total",
            "Times a channel was disabled for the rest of a cycle."
        );
        describe_gauge!(
            "notifier_last_cycle_ts",
            "Unix ts when the last check cycle started."
        );
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from inside the tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
