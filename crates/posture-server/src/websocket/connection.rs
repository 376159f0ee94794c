//! Per-socket connection handle.
//!
//! A [`ClientConnection`] is created and owned by the socket's supervisor.
//! The registry and the fan-out only hold `Arc` clones to enqueue messages
//! and, for observers, to raise the eviction signal.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Which endpoint a socket arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// `/stream`: pushes landmark frames.
    Sender,
    /// `/dashboard`: receives posture updates.
    Observer,
}

impl Role {
    /// Lowercase name used in ids, logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness of a connection. Only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Serving.
    Open = 0,
    /// Supervisor is tearing down.
    Closing = 1,
    /// Unregistered and released.
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Why a non-blocking send did not enqueue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Outbound queue is at capacity.
    #[error("outbound queue full")]
    QueueFull,
    /// The writer task is gone.
    #[error("connection closed")]
    Closed,
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Generate a connection id: `"<role>_<uuid-v7>"`.
pub fn connection_id(role: Role) -> String {
    format!("{}_{}", role.as_str(), uuid::Uuid::now_v7())
}

/// A connected WebSocket client.
pub struct ClientConnection {
    id: String,
    role: Role,
    tx: mpsc::Sender<Arc<String>>,
    connected_at: Instant,
    state: AtomicU8,
    last_seen: Mutex<Instant>,
    dropped_messages: AtomicU64,
    eviction: CancellationToken,
    delivery_failure: CancellationToken,
}

impl ClientConnection {
    /// Create an open connection feeding `tx`.
    pub fn new(id: String, role: Role, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            role,
            tx,
            connected_at: now,
            state: AtomicU8::new(ConnectionState::Open as u8),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            eviction: CancellationToken::new(),
            delivery_failure: CancellationToken::new(),
        }
    }

    /// Connection id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Endpoint role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Enqueue a pre-serialized message without waiting.
    ///
    /// A full queue increments the drop counter.
    pub fn send(&self, message: Arc<String>) -> Result<(), DeliveryError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Serialize `value` and enqueue it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), DeliveryError> {
        let json =
            serde_json::to_string(value).map_err(|e| DeliveryError::Encode(e.to_string()))?;
        self.send(Arc::new(json))
    }

    /// Messages dropped on a full queue so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound frame (or since connect).
    pub fn idle(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Time since connect.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Current liveness state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the connection is still [`ConnectionState::Open`].
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Move `Open → Closing`. Returns `false` if teardown already started.
    pub fn begin_close(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Open as u8,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to [`ConnectionState::Closed`] from any state.
    pub fn mark_closed(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }

    /// Ask the supervisor to close this connection.
    pub fn evict(&self) {
        self.eviction.cancel();
    }

    /// Whether [`evict`](Self::evict) has been called.
    pub fn is_evicted(&self) -> bool {
        self.eviction.is_cancelled()
    }

    /// Resolves once the connection is evicted.
    pub async fn evicted(&self) {
        self.eviction.cancelled().await;
    }

    /// Record that a message owed to this client could not be enqueued.
    ///
    /// The supervisor closes the socket as a write failure.
    pub fn fail_delivery(&self) {
        self.delivery_failure.cancel();
    }

    /// Whether [`fail_delivery`](Self::fail_delivery) has been called.
    pub fn delivery_failed(&self) -> bool {
        self.delivery_failure.is_cancelled()
    }

    /// Resolves once a delivery has failed.
    pub async fn delivery_failure(&self) {
        self.delivery_failure.cancelled().await;
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .field("dropped_messages", &self.drop_count())
            .finish_non_exhaustive()
    }
}
