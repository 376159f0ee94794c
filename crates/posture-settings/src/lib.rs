//! # posture-settings
//!
//! Configuration for the posture monitoring server, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`PostureSettings::default()`]
//! 2. **Settings file**: `~/.posture/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `POSTURE_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = PostureSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = PostureSettings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.classifier.kind, ClassifierKind::Rules);
        assert!(settings.classifier.model_path.is_none());
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }
}
