//! Sender frame processing: decode, validate, classify, reply, broadcast.
//!
//! [`FramePipeline::evaluate`] is pure and decides the outcome of one text
//! frame. [`FramePipeline::handle`] applies that outcome: one reply to the
//! sender and, for classified frames only, one broadcast. The two are
//! independent, so a full sender queue never suppresses the broadcast.
//!
//! A reply that cannot be enqueued marks the sender with
//! [`ClientConnection::fail_delivery`]; its supervisor then closes the
//! socket, so no frame is left silently unanswered on an open connection.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use posture_core::landmarks::has_required_landmarks;
use posture_core::{
    Classification, ClassifierProvider, extract_features, pair_coordinates,
};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::broadcast::{BroadcastFanout, BroadcastReport};
use super::connection::ClientConnection;
use crate::metrics::{CLASSIFICATIONS_TOTAL, FRAME_DURATION_SECONDS, FRAMES_TOTAL};
use crate::protocol::{FrameError, PostureUpdate, SenderReply, decode_frame};

/// What became of one sender frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Classified; reply and broadcast.
    Classified {
        /// Echoed sender timestamp.
        timestamp: Value,
        /// Classifier output.
        classification: Classification,
    },
    /// Fewer landmark pairs than the features need.
    Insufficient {
        /// Pairs received.
        pairs: usize,
    },
    /// Undecodable payload.
    Malformed(FrameError),
    /// No classifier is loaded.
    Unavailable,
}

impl FrameOutcome {
    /// The reply owed to the sender.
    pub fn reply(&self) -> SenderReply {
        match self {
            Self::Classified {
                timestamp,
                classification,
            } => SenderReply::classified(timestamp.clone(), *classification),
            Self::Insufficient { .. } => SenderReply::insufficient(),
            Self::Malformed(_) => SenderReply::malformed(),
            Self::Unavailable => SenderReply::unavailable(),
        }
    }

    /// The observer update, for classified frames only.
    pub fn update(&self) -> Option<PostureUpdate> {
        match self {
            Self::Classified {
                timestamp,
                classification,
            } => Some(PostureUpdate::new(classification.label, timestamp.clone())),
            _ => None,
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Classified { .. } => "classified",
            Self::Insufficient { .. } => "insufficient",
            Self::Malformed(_) => "malformed",
            Self::Unavailable => "unavailable",
        }
    }
}

/// What [`FramePipeline::handle`] did with a frame.
#[derive(Debug)]
pub struct HandledFrame {
    /// Decided outcome.
    pub outcome: FrameOutcome,
    /// Whether the reply was enqueued to the sender.
    pub replied: bool,
    /// Fan-out report, when the frame was broadcast.
    pub broadcast: Option<BroadcastReport>,
}

/// Shared by every sender session.
#[derive(Debug)]
pub struct FramePipeline {
    provider: ClassifierProvider,
    fanout: Arc<BroadcastFanout>,
}

impl FramePipeline {
    /// Classify with `provider`, broadcast through `fanout`.
    pub fn new(provider: ClassifierProvider, fanout: Arc<BroadcastFanout>) -> Self {
        Self { provider, fanout }
    }

    /// The classifier provider.
    pub fn provider(&self) -> &ClassifierProvider {
        &self.provider
    }

    /// Decide the outcome of one text frame.
    pub fn evaluate(&self, text: &str) -> FrameOutcome {
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => return FrameOutcome::Malformed(e),
        };
        if let Some(session_id) = &frame.session_id {
            trace!(%session_id, "frame session");
        }

        let points = pair_coordinates(&frame.landmarks);
        if !has_required_landmarks(&points) {
            return FrameOutcome::Insufficient {
                pairs: points.len(),
            };
        }

        let Some(classifier) = self.provider.classifier() else {
            return FrameOutcome::Unavailable;
        };

        let features = extract_features(&points);
        let classification = classifier.classify(&features);
        debug!(
            nose_y = features.nose_y,
            shoulder_y = features.shoulder_y,
            hip_y = features.hip_y,
            torso_length = features.torso_length,
            posture = %classification.label,
            "frame classified"
        );
        FrameOutcome::Classified {
            timestamp: frame.timestamp,
            classification,
        }
    }

    /// Reject a frame that could not be read as text.
    pub fn reject(&self, sender: &ClientConnection, error: FrameError) -> HandledFrame {
        self.apply(sender, FrameOutcome::Malformed(error), Instant::now())
    }

    /// Process one text frame from `sender`.
    pub fn handle(&self, sender: &ClientConnection, text: &str) -> HandledFrame {
        let started = Instant::now();
        let outcome = self.evaluate(text);
        self.apply(sender, outcome, started)
    }

    fn apply(&self, sender: &ClientConnection, outcome: FrameOutcome, started: Instant) -> HandledFrame {
        counter!(FRAMES_TOTAL, "outcome" => outcome.kind()).increment(1);
        match &outcome {
            FrameOutcome::Classified { classification, .. } => {
                counter!(CLASSIFICATIONS_TOTAL, "posture" => classification.label.as_str())
                    .increment(1);
            }
            FrameOutcome::Insufficient { pairs } => {
                debug!(conn_id = sender.id(), pairs, "insufficient landmarks");
            }
            FrameOutcome::Malformed(e) => {
                debug!(conn_id = sender.id(), reason = e.kind(), "malformed frame");
            }
            FrameOutcome::Unavailable => {
                debug!(conn_id = sender.id(), "no classifier loaded");
            }
        }

        let replied = match sender.send_json(&outcome.reply()) {
            Ok(()) => true,
            Err(e) => {
                warn!(conn_id = sender.id(), error = %e, "reply not enqueued, closing sender");
                sender.fail_delivery();
                false
            }
        };
        let broadcast = outcome.update().map(|update| self.fanout.broadcast(&update));

        histogram!(FRAME_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        HandledFrame {
            outcome,
            replied,
            broadcast,
        }
    }
}
