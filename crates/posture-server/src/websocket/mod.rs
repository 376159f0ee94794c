//! `WebSocket` connection handling.
//!
//! - [`connection`]: per-socket handle with a bounded outbound queue
//! - [`registry`]: sender and observer membership sets
//! - [`pipeline`]: sender frame processing
//! - [`broadcast`]: non-blocking fan-out to observers
//! - [`session`]: per-socket supervisor

pub mod broadcast;
pub mod connection;
pub mod pipeline;
pub mod registry;
pub mod session;

pub use broadcast::{BroadcastFanout, BroadcastReport, DeliveryOutcome, EvictionReason};
pub use connection::{ClientConnection, ConnectionState, DeliveryError, Role};
pub use pipeline::{FrameOutcome, FramePipeline};
pub use registry::{ConnectionRegistry, RegistrationGuard};
pub use session::{CloseReason, SessionContext, run_ws_session};
