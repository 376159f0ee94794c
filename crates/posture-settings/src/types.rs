//! Settings types with compiled defaults.
//!
//! Field names are camelCase on disk. Every struct uses `#[serde(default)]`
//! so a partial settings file only needs the keys it changes.

use std::fmt;
use std::str::FromStr;

use posture_core::RuleThresholds;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostureSettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Classifier selection.
    pub classifier: ClassifierSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl PostureSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.server;
        if s.outbound_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.outboundQueueCapacity must be at least 1".into(),
            ));
        }
        if s.max_observer_drops == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxObserverDrops must be at least 1".into(),
            ));
        }
        if s.ping_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.pingIntervalSecs must be at least 1".into(),
            ));
        }
        if s.pong_timeout_secs < s.ping_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.pongTimeoutSecs must not be shorter than server.pingIntervalSecs".into(),
            ));
        }
        Ok(())
    }
}

/// Server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Interface to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Upper bound on simultaneously open connections of both roles.
    pub max_connections: usize,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue_capacity: usize,
    /// Dropped broadcasts an observer may accumulate before it is evicted.
    pub max_observer_drops: u64,
    /// Seconds between server Ping frames.
    pub ping_interval_secs: u64,
    /// Seconds of client silence before the connection is closed.
    pub pong_timeout_secs: u64,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            max_connections: 1024,
            outbound_queue_capacity: 64,
            max_observer_drops: 32,
            ping_interval_secs: 30,
            pong_timeout_secs: 90,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Which classifier implementation to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// The reference rule table. Always available.
    #[default]
    Rules,
    /// A decision forest loaded from `classifier.modelPath`.
    Model,
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rules => f.write_str("rules"),
            Self::Model => f.write_str("model"),
        }
    }
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "model" => Ok(Self::Model),
            other => Err(format!("unknown classifier kind '{other}' (expected rules or model)")),
        }
    }
}

/// Classifier settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    /// Implementation to run.
    pub kind: ClassifierKind,
    /// Forest artifact path, used when `kind` is `model`.
    pub model_path: Option<String>,
    /// Thresholds for the rule table.
    pub thresholds: RuleThresholds,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.port, 8000);
        assert_eq!(s.max_connections, 1024);
        assert_eq!(s.outbound_queue_capacity, 64);
        assert_eq!(s.max_observer_drops, 32);
        assert_eq!(s.ping_interval_secs, 30);
        assert_eq!(s.pong_timeout_secs, 90);
        assert_eq!(s.max_message_size, 1024 * 1024);
    }

    #[test]
    fn camel_case_on_disk() {
        let json = serde_json::to_value(PostureSettings::default()).unwrap();
        assert!(json["server"]["maxObserverDrops"].is_number());
        assert!(json["classifier"]["thresholds"]["lyingTorsoMax"].is_number());
        assert_eq!(json["classifier"]["kind"], "rules");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: PostureSettings =
            serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn classifier_kind_from_str() {
        assert_eq!("rules".parse::<ClassifierKind>().unwrap(), ClassifierKind::Rules);
        assert_eq!("MODEL".parse::<ClassifierKind>().unwrap(), ClassifierKind::Model);
        assert!("svm".parse::<ClassifierKind>().is_err());
    }

    #[test]
    fn classifier_kind_display_round_trips() {
        for kind in [ClassifierKind::Rules, ClassifierKind::Model] {
            assert_eq!(kind.to_string().parse::<ClassifierKind>().unwrap(), kind);
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(PostureSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_queue_capacity_is_invalid() {
        let mut settings = PostureSettings::default();
        settings.server.outbound_queue_capacity = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("outboundQueueCapacity"));
    }

    #[test]
    fn zero_drop_budget_is_invalid() {
        let mut settings = PostureSettings::default();
        settings.server.max_observer_drops = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn pong_timeout_shorter_than_ping_is_invalid() {
        let mut settings = PostureSettings::default();
        settings.server.ping_interval_secs = 30;
        settings.server.pong_timeout_secs = 10;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("pongTimeoutSecs"));
    }
}
