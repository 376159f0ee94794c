//! Per-socket supervisor: upgrade through teardown.
//!
//! The supervisor is the only code that closes a socket. It registers the
//! connection behind a [`RegistrationGuard`](super::registry::RegistrationGuard),
//! runs the role loop, and leaves on the first of: client close, transport
//! error, writer exit (idle timeout or write failure), a reply that could not
//! be enqueued, eviction, or server shutdown. Teardown releases the guard
//! before draining the writer, so a closing connection is never a broadcast
//! target; dropping the guard covers every other path.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, Role, connection_id};
use super::pipeline::FramePipeline;
use super::registry::ConnectionRegistry;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::protocol::FrameError;

/// Grace period for the writer to flush a close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a session needs from the server.
#[derive(Debug)]
pub struct SessionContext {
    /// Shared membership sets.
    pub registry: Arc<ConnectionRegistry>,
    /// Frame processing for senders.
    pub pipeline: Arc<FramePipeline>,
    /// Server shutdown signal.
    pub shutdown: CancellationToken,
    /// Outbound queue capacity.
    pub queue_capacity: usize,
    /// Ping cadence.
    pub ping_interval: Duration,
    /// Idle limit.
    pub pong_timeout: Duration,
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent Close or the stream ended.
    ClientClosed,
    /// Read error on the socket.
    TransportError,
    /// No inbound frame within the idle limit.
    IdleTimeout,
    /// Write error on the socket.
    WriteFailed,
    /// Removed by the fan-out.
    Evicted,
    /// Server shutting down.
    Shutdown,
    /// Registration was refused.
    Refused,
}

impl CloseReason {
    /// Metric and log label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::IdleTimeout => "idle_timeout",
            Self::WriteFailed => "write_failed",
            Self::Evicted => "evicted",
            Self::Shutdown => "shutdown",
            Self::Refused => "refused",
        }
    }

    fn close_frame(self) -> Option<CloseFrame> {
        let (code, reason) = match self {
            Self::Shutdown => (close_code::AWAY, "server shutting down"),
            Self::Evicted => (close_code::POLICY, "too slow"),
            Self::IdleTimeout => (close_code::POLICY, "idle timeout"),
            Self::ClientClosed => (close_code::NORMAL, ""),
            Self::Refused => (close_code::ERROR, "registration refused"),
            Self::TransportError | Self::WriteFailed => return None,
        };
        Some(CloseFrame {
            code,
            reason: reason.into(),
        })
    }
}

/// Serve one upgraded socket until it closes.
pub async fn run_ws_session(ws: WebSocket, role: Role, ctx: Arc<SessionContext>) {
    let (tx, rx) = mpsc::channel(ctx.queue_capacity.max(1));
    let conn = Arc::new(ClientConnection::new(connection_id(role), role, tx));
    let _ = serve_connection(ws, conn, rx, ctx).await;
}

#[instrument(skip_all, fields(conn_id = %conn.id(), role = %conn.role()))]
async fn serve_connection(
    ws: WebSocket,
    conn: Arc<ClientConnection>,
    rx: mpsc::Receiver<Arc<String>>,
    ctx: Arc<SessionContext>,
) -> CloseReason {
    let role = conn.role();
    let Some(mut guard) = ctx.registry.enroll(&conn) else {
        warn!("connection refused by registry");
        return CloseReason::Refused;
    };

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL, "role" => role.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "role" => role.as_str()).increment(1.0);

    let (sink, mut stream) = ws.split();
    let (stop_tx, stop_rx) = oneshot::channel();
    let mut writer: JoinHandle<CloseReason> = tokio::spawn(write_loop(
        sink,
        rx,
        Arc::clone(&conn),
        ctx.ping_interval,
        ctx.pong_timeout,
        stop_rx,
    ));
    let mut writer_done = false;

    let reason = loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(msg)) => {
                    conn.mark_alive();
                    if let Some(reason) = on_message(&conn, msg, &ctx.pipeline) {
                        break reason;
                    }
                }
                Some(Err(e)) => {
                    debug!(error = %e, "socket read failed");
                    break CloseReason::TransportError;
                }
                None => break CloseReason::ClientClosed,
            },
            exit = &mut writer => {
                writer_done = true;
                break exit.unwrap_or(CloseReason::WriteFailed);
            }
            () = conn.delivery_failure() => break CloseReason::WriteFailed,
            () = conn.evicted() => break CloseReason::Evicted,
            () = ctx.shutdown.cancelled() => break CloseReason::Shutdown,
        }
    };

    guard.release();
    if !writer_done {
        let _ = stop_tx.send(reason);
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }
    }
    drop(guard);

    info!(reason = reason.as_str(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "role" => role.as_str(), "reason" => reason.as_str())
        .increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "role" => role.as_str()).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "role" => role.as_str())
        .record(conn.age().as_secs_f64());
    reason
}

/// Handle one inbound frame. Returns a reason when the session must end.
fn on_message(
    conn: &ClientConnection,
    msg: Message,
    pipeline: &FramePipeline,
) -> Option<CloseReason> {
    match msg {
        Message::Close(_) => {
            debug!("client sent close frame");
            Some(CloseReason::ClientClosed)
        }
        Message::Ping(_) | Message::Pong(_) => None,
        Message::Text(text) => on_payload(conn, Ok(text.as_str()), pipeline),
        Message::Binary(data) => {
            let text = std::str::from_utf8(&data).map_err(|_| FrameError::NotUtf8);
            on_payload(conn, text, pipeline)
        }
    }
}

/// A sender whose reply could not be queued is closed as a write failure.
fn on_payload(
    conn: &ClientConnection,
    text: Result<&str, FrameError>,
    pipeline: &FramePipeline,
) -> Option<CloseReason> {
    match conn.role() {
        Role::Observer => {
            debug!("ignoring observer payload");
            None
        }
        Role::Sender => {
            let handled = match text {
                Ok(text) => pipeline.handle(conn, text),
                Err(e) => pipeline.reject(conn, e),
            };
            (!handled.replied).then_some(CloseReason::WriteFailed)
        }
    }
}

/// Drain the outbound queue into the socket and keep the peer alive.
///
/// Ends when the supervisor sends a stop reason (after writing the matching
/// close frame), when a write fails, or when the peer has been silent for
/// longer than `pong_timeout`.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<String>>,
    conn: Arc<ClientConnection>,
    ping_interval: Duration,
    pong_timeout: Duration,
    mut stop: oneshot::Receiver<CloseReason>,
) -> CloseReason {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            biased;
            stop_reason = &mut stop => break stop_reason.unwrap_or(CloseReason::Shutdown),
            queued = rx.recv() => {
                let Some(text) = queued else { break CloseReason::Shutdown };
                if sink.send(Message::Text(text.as_str().into())).await.is_err() {
                    return CloseReason::WriteFailed;
                }
            }
            _ = ticker.tick() => {
                if conn.idle() > pong_timeout {
                    warn!(idle_secs = conn.idle().as_secs(), "client unresponsive, closing");
                    break CloseReason::IdleTimeout;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return CloseReason::WriteFailed;
                }
            }
        }
    };

    if let Some(frame) = reason.close_frame() {
        let _ = sink.send(Message::Close(Some(frame))).await;
    }
    let _ = sink.close().await;
    reason
}
