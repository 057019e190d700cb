//! Rattan Gateway - websocket transport collaborator.
//!
//! Owns the listening socket, the websocket handshake, and one writer
//! channel per connection. Translates transport events into calls on
//! [`rattan_core::GatewayCore`] and executes the directives it returns.
//! Framing and handshake parsing belong to tokio-tungstenite; nothing
//! here or in the core touches wire bytes.

mod pool;
mod server;

pub use pool::{ConnectionError, ConnectionHandle, ConnectionPool, Outbound};
pub use server::{build_policy, GatewayError, GatewayServer};
