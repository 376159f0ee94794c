//! Posture classification contract and implementations.
//!
//! A classifier is a pure function from [`PostureFeatures`] to a
//! [`Classification`]. Implementations hold no per-frame state and must not
//! panic for finite input, so the server can call them from any connection
//! task concurrently.

pub mod forest;
pub mod provider;
pub mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::landmarks::PostureFeatures;

pub use forest::ForestClassifier;
pub use provider::ClassifierProvider;
pub use rules::{RuleClassifier, RuleThresholds};

/// Coarse posture label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureLabel {
    /// Seated upright.
    Sitting,
    /// Standing upright.
    Standing,
    /// Lying down.
    Lying,
    /// Not enough information to decide.
    Unknown,
}

impl PostureLabel {
    /// Wire name of the label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sitting => "sitting",
            Self::Standing => "standing",
            Self::Lying => "lying",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PostureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative confidence tag attached to a classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Strong agreement.
    High,
    /// Partial agreement.
    Medium,
    /// Weak agreement.
    Low,
}

impl Confidence {
    /// Map a vote share in `[0, 1]` to a tag.
    pub fn from_share(share: f64) -> Self {
        if share >= 0.8 {
            Self::High
        } else if share >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Output of a classifier for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Posture label.
    pub label: PostureLabel,
    /// Confidence tag.
    pub confidence: Confidence,
}

/// A stateless posture decision procedure.
pub trait PostureClassifier: Send + Sync {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Classify one frame's features.
    fn classify(&self, features: &PostureFeatures) -> Classification;
}
