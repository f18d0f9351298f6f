//! WebSocket sessions for the producer (`/`) and consumers (`/client`).

pub mod consumer;
pub mod producer;
