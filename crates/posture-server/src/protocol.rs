//! JSON messages exchanged on the `/stream` and `/dashboard` sockets.
//!
//! Inbound, a sender frame is an object carrying `landmarks` (flat
//! `[x0, y0, x1, y1, ...]`), an optional `timestamp` of any JSON type that is
//! echoed back untouched, and an optional `sessionId` that is only logged.
//!
//! Outbound, every sender frame gets exactly one [`SenderReply`]; observers
//! receive a [`PostureUpdate`] per successful classification. Field order on
//! the wire follows struct declaration order.

use posture_core::{Classification, Confidence, PostureLabel};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Reply error for frames that could not be decoded.
pub const NO_LANDMARKS: &str = "No landmarks in data";
/// Reply error for frames with fewer than the required landmark pairs.
pub const INSUFFICIENT_LANDMARKS: &str = "Insufficient landmarks";
/// Reply error while no classifier is loaded.
pub const CLASSIFIER_UNAVAILABLE: &str = "Classifier unavailable";

/// A decoded sender frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkFrame {
    /// Flat landmark scalars.
    pub landmarks: Vec<f64>,
    /// Sender timestamp, `Null` when absent.
    pub timestamp: Value,
    /// Client session tag, if any.
    pub session_id: Option<Value>,
}

/// Why a frame could not be decoded.
///
/// All variants produce the same [`NO_LANDMARKS`] reply; the distinction is
/// for logs and metrics.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Payload is not JSON.
    #[error("payload is not valid JSON")]
    InvalidJson,
    /// Payload is JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,
    /// Object has no `landmarks` key (or it is `null`).
    #[error("payload has no landmarks")]
    MissingLandmarks,
    /// `landmarks` is not an array of numbers.
    #[error("landmarks must be an array of numbers")]
    InvalidLandmarks,
    /// Binary frame that is not UTF-8 text.
    #[error("binary payload is not UTF-8")]
    NotUtf8,
}

impl FrameError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingLandmarks => "missing_landmarks",
            Self::InvalidLandmarks => "invalid_landmarks",
            Self::NotUtf8 => "not_utf8",
        }
    }
}

/// Decode one sender text frame.
pub fn decode_frame(text: &str) -> Result<LandmarkFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|_| FrameError::InvalidJson)?;
    let Value::Object(mut obj) = value else {
        return Err(FrameError::NotAnObject);
    };

    let landmarks = match obj.remove("landmarks") {
        None | Some(Value::Null) => return Err(FrameError::MissingLandmarks),
        Some(raw) => {
            serde_json::from_value::<Vec<f64>>(raw).map_err(|_| FrameError::InvalidLandmarks)?
        }
    };

    Ok(LandmarkFrame {
        landmarks,
        timestamp: obj.remove("timestamp").unwrap_or(Value::Null),
        session_id: obj.remove("sessionId"),
    })
}

/// The single reply a sender gets for each frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SenderReply {
    /// Frame classified.
    Classified {
        /// Echoed sender timestamp.
        timestamp: Value,
        /// Posture label.
        posture: PostureLabel,
        /// Confidence tag.
        confidence: Confidence,
    },
    /// Frame understood but not classifiable.
    Unknown {
        /// Always [`PostureLabel::Unknown`].
        posture: PostureLabel,
        /// Reason.
        error: &'static str,
    },
    /// Frame not understood.
    Error {
        /// Reason.
        error: &'static str,
    },
}

impl SenderReply {
    /// Reply for a classified frame.
    pub fn classified(timestamp: Value, classification: Classification) -> Self {
        Self::Classified {
            timestamp,
            posture: classification.label,
            confidence: classification.confidence,
        }
    }

    /// Reply for a frame with too few landmarks.
    pub fn insufficient() -> Self {
        Self::Unknown {
            posture: PostureLabel::Unknown,
            error: INSUFFICIENT_LANDMARKS,
        }
    }

    /// Reply while no classifier is loaded.
    pub fn unavailable() -> Self {
        Self::Unknown {
            posture: PostureLabel::Unknown,
            error: CLASSIFIER_UNAVAILABLE,
        }
    }

    /// Reply for an undecodable frame.
    pub fn malformed() -> Self {
        Self::Error {
            error: NO_LANDMARKS,
        }
    }
}

/// Event pushed to every observer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PostureUpdate {
    /// Always `"posture_update"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Posture label.
    pub posture: PostureLabel,
    /// Echoed sender timestamp.
    pub timestamp: Value,
}

impl PostureUpdate {
    /// Event type tag.
    pub const KIND: &'static str = "posture_update";

    /// Build an update.
    pub fn new(posture: PostureLabel, timestamp: Value) -> Self {
        Self {
            kind: Self::KIND,
            posture,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decodes_android_frame() {
        let frame = decode_frame(
            r#"{"timestamp": 1712345678901, "landmarks": [1, 2.5, 3, 4], "sessionId": "abc"}"#,
        )
        .unwrap();
        assert_eq!(frame.landmarks, vec![1.0, 2.5, 3.0, 4.0]);
        assert_eq!(frame.timestamp, json!(1_712_345_678_901_u64));
        assert_eq!(frame.session_id, Some(json!("abc")));
    }

    #[test]
    fn missing_timestamp_is_null() {
        let frame = decode_frame(r#"{"landmarks": []}"#).unwrap();
        assert_eq!(frame.timestamp, Value::Null);
        assert!(frame.session_id.is_none());
    }

    #[test]
    fn timestamp_of_any_type_is_kept() {
        let frame = decode_frame(r#"{"landmarks": [], "timestamp": {"t": "x"}}"#).unwrap();
        assert_eq!(frame.timestamp, json!({"t": "x"}));
    }

    #[test]
    fn decode_failures() {
        assert_matches!(decode_frame("not json"), Err(FrameError::InvalidJson));
        assert_matches!(decode_frame("[1, 2]"), Err(FrameError::NotAnObject));
        assert_matches!(decode_frame(r#"{"timestamp": 1}"#), Err(FrameError::MissingLandmarks));
        assert_matches!(decode_frame(r#"{"landmarks": null}"#), Err(FrameError::MissingLandmarks));
        assert_matches!(
            decode_frame(r#"{"landmarks": [1, "two"]}"#),
            Err(FrameError::InvalidLandmarks)
        );
        assert_matches!(
            decode_frame(r#"{"landmarks": "1,2"}"#),
            Err(FrameError::InvalidLandmarks)
        );
    }

    #[test]
    fn classified_reply_field_order() {
        let reply = SenderReply::classified(
            json!(42),
            Classification {
                label: PostureLabel::Standing,
                confidence: Confidence::High,
            },
        );
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"timestamp":42,"posture":"standing","confidence":"high"}"#
        );
    }

    #[test]
    fn error_replies_match_wire_text() {
        assert_eq!(
            serde_json::to_string(&SenderReply::insufficient()).unwrap(),
            r#"{"posture":"unknown","error":"Insufficient landmarks"}"#
        );
        assert_eq!(
            serde_json::to_string(&SenderReply::malformed()).unwrap(),
            r#"{"error":"No landmarks in data"}"#
        );
        assert_eq!(
            serde_json::to_string(&SenderReply::unavailable()).unwrap(),
            r#"{"posture":"unknown","error":"Classifier unavailable"}"#
        );
    }

    #[test]
    fn posture_update_wire_shape() {
        let update = PostureUpdate::new(PostureLabel::Lying, json!("2026-01-01T00:00:00Z"));
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"type":"posture_update","posture":"lying","timestamp":"2026-01-01T00:00:00Z"}"#
        );
    }

    #[test]
    fn frame_error_kinds_are_distinct() {
        let kinds = [
            FrameError::InvalidJson.kind(),
            FrameError::NotAnObject.kind(),
            FrameError::MissingLandmarks.kind(),
            FrameError::InvalidLandmarks.kind(),
            FrameError::NotUtf8.kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
