//! Build the classifier provider selected in settings.

use std::path::Path;

use posture_core::ClassifierProvider;
use posture_settings::{ClassifierKind, ClassifierSettings};
use tracing::{info, warn};

/// Resolve [`ClassifierSettings`] into a provider.
///
/// `rules` is always ready. `model` is ready only if the artifact at
/// `modelPath` loads; anything else leaves the server in degraded mode.
pub fn build_provider(settings: &ClassifierSettings) -> ClassifierProvider {
    match settings.kind {
        ClassifierKind::Rules => {
            info!(thresholds = ?settings.thresholds, "using rule classifier");
            ClassifierProvider::rules(settings.thresholds)
        }
        ClassifierKind::Model => match settings.model_path.as_deref() {
            Some(path) => ClassifierProvider::forest(Path::new(path)),
            None => {
                warn!("classifier.kind is model but no modelPath is set");
                ClassifierProvider::Unavailable {
                    reason: "no model path configured".into(),
                }
            }
        },
    }
}
