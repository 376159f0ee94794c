//! Classifier availability.
//!
//! The server asks the provider once per frame whether a classifier is usable.
//! A provider that failed to initialize stays [`ClassifierProvider::Unavailable`]
//! for the life of the process; frames are then answered with an `unknown`
//! posture instead of being classified.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::{ForestClassifier, PostureClassifier, RuleClassifier, RuleThresholds};

/// Either a ready classifier or the reason none is available.
#[derive(Clone)]
pub enum ClassifierProvider {
    /// A usable classifier.
    Ready(Arc<dyn PostureClassifier>),
    /// Initialization failed.
    Unavailable {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl ClassifierProvider {
    /// Provider backed by the reference rule table.
    pub fn rules(thresholds: RuleThresholds) -> Self {
        Self::Ready(Arc::new(RuleClassifier::new(thresholds)))
    }

    /// Provider backed by a forest artifact at `path`.
    ///
    /// A load failure is logged and yields [`ClassifierProvider::Unavailable`].
    pub fn forest(path: &Path) -> Self {
        match ForestClassifier::load(path) {
            Ok(forest) => {
                info!(path = %path.display(), trees = forest.tree_count(), "classifier model loaded");
                Self::Ready(Arc::new(forest))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "classifier model not loaded");
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Whether a classifier is usable.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The classifier, if one is usable.
    pub fn classifier(&self) -> Option<&dyn PostureClassifier> {
        match self {
            Self::Ready(classifier) => Some(classifier.as_ref()),
            Self::Unavailable { .. } => None,
        }
    }

    /// Name of the active classifier, or `"unavailable"`.
    pub fn name(&self) -> &str {
        self.classifier().map_or("unavailable", |c| c.name())
    }
}

impl Default for ClassifierProvider {
    fn default() -> Self {
        Self::rules(RuleThresholds::default())
    }
}

impl std::fmt::Debug for ClassifierProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(classifier) => f.debug_tuple("Ready").field(&classifier.name()).finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}
