//! Lifecycle notification.
//!
//! Decouples the transport from application logic: the application
//! registers [`EventHandler`]s once at startup and the core invokes them
//! on open/message/close. Return values are never consumed by the core.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionId};
use crate::frame::Frame;

/// Application-level hooks for connection lifecycle events.
///
/// All methods default to no-ops so implementors only write the hooks
/// they care about. Handlers must not block; long-running work belongs
/// in a spawned task.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// A connection was registered.
    async fn on_open(&self, _conn: &Connection) {}

    /// A frame arrived on a live connection, before dispatch.
    async fn on_message(&self, _frame: &Frame) {}

    /// A connection was removed from the registry.
    async fn on_close(&self, _id: ConnectionId) {}
}

/// Invokes registered handlers in registration order.
#[derive(Default)]
pub struct LifecycleNotifier {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl LifecycleNotifier {
    /// Create a notifier with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers fire in registration order.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Notify handlers of an opened connection.
    pub async fn notify_open(&self, conn: &Connection) {
        for handler in &self.handlers {
            handler.on_open(conn).await;
        }
    }

    /// Notify handlers of an inbound frame.
    pub async fn notify_message(&self, frame: &Frame) {
        for handler in &self.handlers {
            handler.on_message(frame).await;
        }
    }

    /// Notify handlers of a closed connection.
    pub async fn notify_close(&self, id: ConnectionId) {
        for handler in &self.handlers {
            handler.on_close(id).await;
        }
    }
}

/// Default handler that mirrors lifecycle events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    async fn on_open(&self, conn: &Connection) {
        info!(conn = %conn.id, "connection opened");
    }

    async fn on_message(&self, frame: &Frame) {
        debug!(conn = %frame.conn, bytes = frame.len(), kind = ?frame.kind, "frame received");
    }

    async fn on_close(&self, id: ConnectionId) {
        info!(conn = %id, "connection closed");
    }
}
