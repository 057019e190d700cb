//! Writer-side connection handles.
//!
//! Each connection task owns its socket; everyone else talks to it
//! through a [`ConnectionHandle`] holding the writer channel. The pool
//! maps connection ids to handles so directives for any connection can
//! be executed from any task.

use std::net::SocketAddr;

use dashmap::DashMap;
use rattan_core::ConnectionId;
use tokio::sync::mpsc;
use tracing::debug;

/// Command sent to a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send these bytes to the client
    Data(Vec<u8>),
    /// Send a close frame and stop the connection task
    Close,
}

/// Errors from sending through a handle.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection task has already exited
    #[error("connection closed")]
    Closed,
    /// No handle registered for this id
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),
}

/// Handle to one connection's writer channel.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection id, shared with the core registry
    pub id: ConnectionId,
    /// Client address
    pub addr: SocketAddr,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Wrap a writer channel.
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { id, addr, sender }
    }

    /// Queue a payload for delivery.
    pub fn push(&self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.sender
            .send(Outbound::Data(payload))
            .map_err(|_| ConnectionError::Closed)
    }

    /// Ask the connection task to close the socket.
    pub fn close(&self) -> Result<(), ConnectionError> {
        self.sender
            .send(Outbound::Close)
            .map_err(|_| ConnectionError::Closed)
    }
}

/// All live connection handles, keyed by id.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    connections: DashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of handles.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Register a handle.
    pub fn add(&self, handle: ConnectionHandle) {
        self.connections.insert(handle.id, handle);
    }

    /// Drop a handle, returning it if present.
    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(&id).map(|(_, handle)| {
            debug!(conn = %id, "handle removed from pool");
            handle
        })
    }

    /// Clone a handle by id.
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Queue a payload for one connection.
    pub fn push_to(&self, id: ConnectionId, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.get(id)
            .ok_or(ConnectionError::NotFound(id))?
            .push(payload)
    }

    /// Ask one connection to close.
    pub fn close_to(&self, id: ConnectionId) -> Result<(), ConnectionError> {
        self.get(id).ok_or(ConnectionError::NotFound(id))?.close()
    }
}
