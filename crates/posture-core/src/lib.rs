//! # posture-core
//!
//! Pure building blocks for the posture monitoring server:
//!
//! - **Landmarks**: pairing flat coordinate streams into points and deriving
//!   the normalized [`PostureFeatures`] a classifier needs
//! - **Classifier**: the [`PostureClassifier`] contract, the reference
//!   [`RuleClassifier`], a JSON-loaded [`ForestClassifier`], and the
//!   [`ClassifierProvider`] that reports whether a classifier is usable
//! - **Logging**: `tracing` subscriber setup and log capture for tests
//!
//! Nothing in this crate performs network I/O or holds cross-frame state.

#![deny(unsafe_code)]

pub mod classifier;
pub mod errors;
pub mod landmarks;
pub mod logging;

pub use classifier::{
    Classification, ClassifierProvider, Confidence, ForestClassifier, PostureClassifier,
    PostureLabel, RuleClassifier, RuleThresholds,
};
pub use errors::ModelError;
pub use landmarks::{PostureFeatures, extract_features, pair_coordinates};
