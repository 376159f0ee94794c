//! # posture-server
//!
//! Axum HTTP + `WebSocket` server for live posture monitoring.
//!
//! - `/stream`: senders push landmark frames and get one reply per frame
//! - `/dashboard`: observers receive every successful classification
//! - `/`, `/health`, `/metrics`: status, liveness and Prometheus text
//!
//! Each socket is served by one supervisor task that owns its registry
//! entry; the broadcast fan-out never blocks on a slow observer.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod status;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::PostureServer;
