//! Reference rule-based posture policy.

use serde::{Deserialize, Serialize};

use super::{Classification, Confidence, PostureClassifier, PostureLabel};
use crate::landmarks::PostureFeatures;

/// Thresholds for [`RuleClassifier`], in normalized frame units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleThresholds {
    /// Torso shorter than this reads as lying.
    pub lying_torso_max: f64,
    /// Hips lower in the frame than this read as sitting.
    pub sitting_hip_min: f64,
    /// Hips higher in the frame than this read as standing.
    pub standing_hip_max: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            lying_torso_max: 0.05,
            sitting_hip_min: 0.6,
            standing_hip_max: 0.4,
        }
    }
}

/// First-match rule table over hip height and torso length.
///
/// Rules, in order:
/// 1. `torso_length < lying_torso_max` → lying
/// 2. `hip_y > sitting_hip_min` → sitting
/// 3. `hip_y < standing_hip_max` → standing
/// 4. otherwise → sitting
///
/// The last rule is a fallback, not an inference. Confidence is always
/// [`Confidence::High`].
#[derive(Clone, Debug, Default)]
pub struct RuleClassifier {
    thresholds: RuleThresholds,
}

impl RuleClassifier {
    /// Create a classifier with the given thresholds.
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use.
    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    fn label(&self, features: &PostureFeatures) -> PostureLabel {
        let t = &self.thresholds;
        if features.torso_length < t.lying_torso_max {
            PostureLabel::Lying
        } else if features.hip_y > t.sitting_hip_min {
            PostureLabel::Sitting
        } else if features.hip_y < t.standing_hip_max {
            PostureLabel::Standing
        } else {
            PostureLabel::Sitting
        }
    }
}

impl PostureClassifier for RuleClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    fn classify(&self, features: &PostureFeatures) -> Classification {
        Classification {
            label: self.label(features),
            confidence: Confidence::High,
        }
    }
}
