//! Error types for loading classifier model artifacts.

use thiserror::Error;

/// Errors raised while loading or validating a model artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The artifact could not be read from disk.
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
    /// The artifact is not valid JSON for the expected schema.
    #[error("failed to parse model JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The artifact parsed but is structurally unusable.
    #[error("invalid model: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = ModelError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: ModelError = json_err.into();
        assert!(matches!(err, ModelError::Json(_)));
        assert!(err.to_string().contains("parse model JSON"));
    }

    #[test]
    fn invalid_display() {
        let err = ModelError::Invalid("forest has no trees".into());
        assert_eq!(err.to_string(), "invalid model: forest has no trees");
    }
}
