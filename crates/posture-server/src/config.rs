//! Runtime configuration for [`PostureServer`](crate::PostureServer).

use std::time::Duration;

use posture_settings::ServerSettings;

/// Server limits and timings.
///
/// Built from [`ServerSettings`] in the binary; the [`Default`] binds an
/// ephemeral loopback port, which is what tests want.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind, `0` for auto-assign.
    pub port: u16,
    /// Upgrades are refused once this many sockets are registered.
    pub max_connections: usize,
    /// Per-connection outbound queue capacity.
    pub outbound_queue_capacity: usize,
    /// Dropped broadcasts after which an observer is evicted.
    pub max_observer_drops: u64,
    /// Seconds between server Ping frames.
    pub ping_interval_secs: u64,
    /// Seconds of inbound silence before a socket is closed.
    pub pong_timeout_secs: u64,
    /// Largest inbound message in bytes.
    pub max_message_size: usize,
}

impl ServerConfig {
    /// Ping cadence as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Idle limit as a [`Duration`].
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            outbound_queue_capacity: 64,
            max_observer_drops: 32,
            ping_interval_secs: 30,
            pong_timeout_secs: 90,
            max_message_size: 1024 * 1024,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            outbound_queue_capacity: s.outbound_queue_capacity.max(1),
            max_observer_drops: s.max_observer_drops.max(1),
            ping_interval_secs: s.ping_interval_secs,
            pong_timeout_secs: s.pong_timeout_secs,
            max_message_size: s.max_message_size,
        }
    }
}
