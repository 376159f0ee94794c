//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Liveness snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the process is serving.
    pub status: &'static str,
    /// Seconds since the server was constructed.
    pub uptime_secs: u64,
    /// Registered sender sockets.
    pub senders: usize,
    /// Registered observer sockets.
    pub observers: usize,
}

/// Build a health response from live registry counts.
pub fn health_check(start_time: Instant, senders: usize, observers: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        senders,
        observers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_server_is_ok() {
        let resp = health_check(Instant::now(), 0, 0);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_counts_from_start() {
        let start = Instant::now().checked_sub(Duration::from_secs(120)).unwrap();
        assert!(health_check(start, 0, 0).uptime_secs >= 119);
    }

    #[test]
    fn serializes_role_counts() {
        let json = serde_json::to_value(health_check(Instant::now(), 2, 5)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["senders"], 2);
        assert_eq!(json["observers"], 5);
        assert!(json["uptime_secs"].is_u64());
    }
}
