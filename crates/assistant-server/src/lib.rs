//! # assistant-server
//!
//! Session relay between one Moblin producer and any number of consumers.
//!
//! - `/` producer WebSocket: challenge/response identification, events,
//!   correlated responses and preview frames
//! - `/client` consumer WebSocket: request forwarding with correlation
//! - `/preview` MJPEG stream fanned out from producer frames
//! - `/health` relay status snapshot

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod preview;
pub mod relay;
pub mod server;
pub mod websocket;

pub use config::ServerConfig;
pub use relay::Relay;
pub use server::RelayServer;
