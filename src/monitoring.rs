use crate::{config::MetricsConfig, error::TrackingError};
use metrics::{Counter, Gauge, Unit, counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

const FRAMES_RECEIVED: &str = "seller_tracking_frames_received_total";
const FRAMES_DROPPED: &str = "seller_tracking_frames_dropped_total";
const RECONNECTS: &str = "seller_tracking_reconnects_total";
const HEARTBEATS: &str = "seller_tracking_heartbeats_sent_total";
const CONNECTED: &str = "seller_tracking_connected";

pub static FRAMES_RECEIVED_COUNTER: LazyLock<Counter> = LazyLock::new(|| counter!(FRAMES_RECEIVED));
pub static FRAMES_DROPPED_COUNTER: LazyLock<Counter> = LazyLock::new(|| counter!(FRAMES_DROPPED));
pub static RECONNECT_COUNTER: LazyLock<Counter> = LazyLock::new(|| counter!(RECONNECTS));
pub static HEARTBEAT_COUNTER: LazyLock<Counter> = LazyLock::new(|| counter!(HEARTBEATS));
/// 1 while a tracking socket is open, 0 otherwise.
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!(CONNECTED));

fn describe_series() {
    describe_counter!(FRAMES_RECEIVED, Unit::Count, "Text frames read from the tracking socket");
    describe_counter!(
        FRAMES_DROPPED,
        Unit::Count,
        "Frames discarded as malformed or out of range"
    );
    describe_counter!(RECONNECTS, Unit::Count, "Reconnect attempts scheduled after a close");
    describe_counter!(HEARTBEATS, Unit::Count, "Heartbeat pings queued on an open socket");
    describe_gauge!(CONNECTED, "Whether the tracking socket is currently open");
}

/// Installs the Prometheus recorder and serves `/metrics` on `config.port`.
///
/// Must run inside the tokio runtime; the exporter spawns its HTTP listener there.
pub async fn setup_metrics(config: &MetricsConfig) -> Result<(), TrackingError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", env!("CARGO_PKG_NAME"))
        .add_global_label("version", env!("CARGO_PKG_VERSION"))
        .install()
        .map_err(|e| {
            error!("Failed to start metrics server: {}", e);
            TrackingError::MetricsError(e.to_string())
        })?;

    describe_series();
    // Export every series from the first scrape, not only after its first event.
    FRAMES_RECEIVED_COUNTER.absolute(0);
    FRAMES_DROPPED_COUNTER.absolute(0);
    RECONNECT_COUNTER.absolute(0);
    HEARTBEAT_COUNTER.absolute(0);
    CONNECTED_GAUGE.set(0.0);

    info!("Prometheus metrics available at http://{}/metrics", addr);
    Ok(())
}
