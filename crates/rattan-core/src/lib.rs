//! Rattan Core - connection registry and message dispatch for the gateway
//!
//! This crate holds the transport-independent half of the gateway: it
//! tracks which connections are alive, turns inbound frames into
//! push/close directives through a response policy, and notifies
//! application-level handlers on lifecycle events. It performs no I/O;
//! a transport crate drives it and executes the directives it returns.

mod connection;
mod dispatch;
mod events;
mod frame;
mod gateway;
mod registry;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use gateway::GatewayCore;
pub use dispatch::{
    AckThenClose, DispatchError, DispatchResult, Dispatcher, Directive, Echo, ResponsePolicy,
    DEFAULT_ACK_PAYLOAD,
};
pub use events::{EventHandler, LifecycleNotifier, LogHandler};
pub use frame::{Frame, FrameKind};
pub use registry::{ConnectionRegistry, RegistryError};
