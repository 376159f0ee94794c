//! Prometheus recorder and metric names.
//!
//! Every metric call is a no-op until [`install_recorder`] runs, so library
//! code and tests record freely.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the global Prometheus recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections accepted (counter, labels: role).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections closed (counter, labels: role, reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket connections (gauge, labels: role).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at the connection limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Connection lifetime (histogram, labels: role).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Sender frames processed (counter, labels: outcome).
pub const FRAMES_TOTAL: &str = "frames_total";
/// Frame processing time from decode to fan-out (histogram).
pub const FRAME_DURATION_SECONDS: &str = "frame_duration_seconds";
/// Successful classifications (counter, labels: posture).
pub const CLASSIFICATIONS_TOTAL: &str = "classifications_total";
/// Broadcast messages enqueued to observers (counter).
pub const BROADCAST_DELIVERIES_TOTAL: &str = "broadcast_deliveries_total";
/// Broadcast messages dropped on a full observer queue (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "broadcast_drops_total";
/// Observers evicted by the fan-out (counter).
pub const BROADCAST_EVICTIONS_TOTAL: &str = "broadcast_evictions_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders() {
        // build_recorder avoids touching the global recorder
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(FRAMES_TOTAL, "outcome" => "classified").increment(2);
        });
        let text = handle.render();
        assert!(text.contains("frames_total"));
        assert!(text.contains("outcome=\"classified\""));
    }

    #[test]
    fn names_are_snake_case() {
        for name in [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTIONS_REJECTED_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            FRAMES_TOTAL,
            FRAME_DURATION_SECONDS,
            CLASSIFICATIONS_TOTAL,
            BROADCAST_DELIVERIES_TOTAL,
            BROADCAST_DROPS_TOTAL,
            BROADCAST_EVICTIONS_TOTAL,
        ] {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
