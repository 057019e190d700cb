//! Gateway core context.
//!
//! One [`GatewayCore`] is constructed at startup and shared with the
//! transport. It replaces ambient server state with explicit ownership:
//! the core owns the registry, the dispatcher, and the notifier, and the
//! transport only ever talks to these three entry points.

use std::sync::Arc;

use crate::connection::ConnectionId;
use crate::dispatch::{DispatchError, Dispatcher, Directive, ResponsePolicy};
use crate::events::{EventHandler, LifecycleNotifier};
use crate::frame::Frame;
use crate::registry::{ConnectionRegistry, RegistryError};

/// Transport-facing entry points of the gateway core.
pub struct GatewayCore {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
    notifier: LifecycleNotifier,
}

impl GatewayCore {
    /// Build a core around a response policy.
    pub fn new(policy: Arc<dyn ResponsePolicy>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), policy);
        Self {
            registry,
            dispatcher,
            notifier: LifecycleNotifier::new(),
        }
    }

    /// Register a lifecycle handler. Call before sharing the core with
    /// the transport.
    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.notifier.register(handler);
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Transport reported a new connection.
    ///
    /// Registers the id and notifies handlers. A duplicate id aborts the
    /// registration and notifies nothing.
    pub async fn handle_open(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.registry.register(id)?;
        if let Some(conn) = self.registry.get(id) {
            self.notifier.notify_open(&conn).await;
        }
        Ok(())
    }

    /// Transport delivered a frame.
    ///
    /// Notifies handlers, runs the dispatcher, and returns the directives
    /// the transport must execute in order. A frame for an unknown id
    /// yields [`DispatchError::UnknownConnection`], no notification, and
    /// no directives.
    pub async fn handle_message(&self, frame: Frame) -> Result<Vec<Directive>, DispatchError> {
        if !self.registry.is_live(frame.conn) {
            return Err(DispatchError::UnknownConnection(frame.conn));
        }
        self.notifier.notify_message(&frame).await;
        self.dispatcher.dispatch(frame)
    }

    /// Transport reported a closed connection.
    ///
    /// Removes the id and notifies handlers. A stale id surfaces
    /// [`RegistryError::StaleRemoval`] and notifies nothing.
    pub async fn handle_close(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.registry.remove(id)?;
        self.notifier.notify_close(id).await;
        Ok(())
    }

    /// Push one payload to every live connection.
    pub fn broadcast(&self, payload: &[u8]) -> Vec<Directive> {
        self.dispatcher.broadcast(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{AckThenClose, Echo, DEFAULT_ACK_PAYLOAD};

    fn ack_core() -> GatewayCore {
        GatewayCore::new(Arc::new(AckThenClose::default()))
    }

    #[tokio::test]
    async fn open_message_close_round_trip() {
        let core = ack_core();
        let id = ConnectionId::new(7);

        core.handle_open(id).await.unwrap();
        assert!(core.registry().is_live(id));

        let directives = core.handle_message(Frame::text(id, "hello")).await.unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::Push {
                    conn: id,
                    payload: DEFAULT_ACK_PAYLOAD.to_vec()
                },
                Directive::Close { conn: id },
            ]
        );

        core.handle_close(id).await.unwrap();
        assert!(!core.registry().is_live(id));
    }

    #[tokio::test]
    async fn message_without_open_is_unknown() {
        let core = ack_core();
        let id = ConnectionId::new(99);

        let err = core.handle_message(Frame::text(id, "x")).await.unwrap_err();
        assert_eq!(err, DispatchError::UnknownConnection(id));
    }

    #[tokio::test]
    async fn duplicate_open_is_rejected() {
        let core = ack_core();
        let id = ConnectionId::new(1);
        core.handle_open(id).await.unwrap();

        let err = core.handle_open(id).await.unwrap_err();
        assert_eq!(err, RegistryError::DuplicateConnection(id));
        assert!(core.registry().is_live(id));
    }

    #[tokio::test]
    async fn close_twice_is_stale() {
        let core = ack_core();
        let id = ConnectionId::new(1);
        core.handle_open(id).await.unwrap();
        core.handle_close(id).await.unwrap();

        let err = core.handle_close(id).await.unwrap_err();
        assert_eq!(err, RegistryError::StaleRemoval(id));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_live_connection() {
        let core = GatewayCore::new(Arc::new(Echo));
        core.handle_open(ConnectionId::new(1)).await.unwrap();
        core.handle_open(ConnectionId::new(2)).await.unwrap();

        let directives = core.broadcast(b"all");
        assert_eq!(directives.len(), 2);

        core.handle_close(ConnectionId::new(1)).await.unwrap();
        assert_eq!(core.broadcast(b"all").len(), 1);
    }

    #[tokio::test]
    async fn handlers_observe_lifecycle() {
        use crate::events::EventHandler;
        use async_trait::async_trait;
        use std::sync::Mutex;

        struct Recorder(Arc<Mutex<Vec<String>>>);

        #[async_trait]
        impl EventHandler for Recorder {
            async fn on_open(&self, conn: &crate::Connection) {
                self.0.lock().unwrap().push(format!("open:{}", conn.id));
            }
            async fn on_message(&self, frame: &Frame) {
                self.0.lock().unwrap().push(format!("message:{}", frame.conn));
            }
            async fn on_close(&self, id: ConnectionId) {
                self.0.lock().unwrap().push(format!("close:{}", id));
            }
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut core = ack_core();
        core.register_handler(Arc::new(Recorder(Arc::clone(&events))));

        let id = ConnectionId::new(7);
        core.handle_open(id).await.unwrap();
        core.handle_message(Frame::text(id, "hello")).await.unwrap();
        core.handle_close(id).await.unwrap();

        // Unknown ids and stale closes notify nothing
        let _ = core.handle_message(Frame::text(ConnectionId::new(99), "x")).await;
        let _ = core.handle_close(id).await;

        assert_eq!(
            events.lock().unwrap().clone(),
            vec!["open:#7", "message:#7", "close:#7"]
        );
    }
}
