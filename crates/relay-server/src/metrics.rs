//! Prometheus recorder setup and metric names.
//!
//! The handle returned by [`install_recorder`] is rendered by the
//! `/metrics` handler.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Poll wait buckets in seconds, up to the longest accepted poll timeout.
const POLL_WAIT_BUCKETS: &[f64] = &[0.01, 0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 3600.0];

/// Session lifetime buckets in seconds.
const CONNECTION_DURATION_BUCKETS: &[f64] = &[1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 14_400.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(POLL_WAIT_SECONDS.to_owned()), POLL_WAIT_BUCKETS)?
        .set_buckets_for_metric(
            Matcher::Full(WS_CONNECTION_DURATION_SECONDS.to_owned()),
            CONNECTION_DURATION_BUCKETS,
        )
}

/// Install the global recorder with relay histogram buckets.
///
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = builder()?.install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric names.

/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Registrations that replaced an existing connection (counter).
pub const WS_CONNECTIONS_REPLACED_TOTAL: &str = "ws_connections_replaced_total";
/// WebSocket connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Frames dropped on a full outbound queue (counter).
pub const WS_FRAMES_DROPPED_TOTAL: &str = "ws_frames_dropped_total";
/// Per-party routing results (counter, labels: outcome).
pub const ROUTE_DELIVERIES_TOTAL: &str = "route_deliveries_total";
/// Mailbox publishes (counter, labels: outcome).
pub const MAILBOX_PUBLISH_TOTAL: &str = "mailbox_publish_total";
/// Polls answered (counter, labels: result).
pub const POLL_REQUESTS_TOTAL: &str = "poll_requests_total";
/// Time a poll waited before answering (histogram).
pub const POLL_WAIT_SECONDS: &str = "poll_wait_seconds";
