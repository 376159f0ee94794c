//! `GET /` status body.

use posture_core::ClassifierProvider;
use serde::Serialize;

/// Fixed service banner.
pub const SERVICE_MESSAGE: &str = "Posture Monitoring Backend";

/// Status response: banner plus whether a classifier is usable.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Always [`SERVICE_MESSAGE`].
    pub message: &'static str,
    /// Whether the classifier initialized.
    pub classifier_loaded: bool,
}

/// Describe the server for the given provider.
pub fn status(provider: &ClassifierProvider) -> StatusResponse {
    StatusResponse {
        message: SERVICE_MESSAGE,
        classifier_loaded: provider.is_ready(),
    }
}
