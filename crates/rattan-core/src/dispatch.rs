//! Frame dispatch.
//!
//! Turns inbound frames into transport directives through a response
//! policy. Policies are stateless and deterministic; the dispatcher
//! enforces the registry invariant before any policy runs.

use std::sync::Arc;

use tracing::debug;

use crate::connection::ConnectionId;
use crate::frame::Frame;
use crate::registry::ConnectionRegistry;

/// Payload pushed by the default policy, taken from the original demo
/// handler this gateway models.
pub const DEFAULT_ACK_PAYLOAD: &[u8] = b"this is server";

/// Dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The frame's connection id has no live registry entry. No reply is
    /// emitted and nothing is retried.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

/// One step of a policy's response to a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Push this payload back to the originating connection
    Reply(Vec<u8>),
    /// Close the originating connection
    Close,
    /// Do nothing for this frame
    Ignore,
}

/// Instruction issued by the core back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Send a payload to a connection
    Push {
        /// Target connection
        conn: ConnectionId,
        /// Bytes to send
        payload: Vec<u8>,
    },
    /// Close a connection
    Close {
        /// Target connection
        conn: ConnectionId,
    },
}

/// Decides how the gateway answers an inbound frame.
///
/// Implementations must be stateless with respect to connections: the
/// same frame always yields the same results.
pub trait ResponsePolicy: Send + Sync {
    /// Produce the ordered responses for one frame.
    fn respond(&self, frame: &Frame) -> Vec<DispatchResult>;
}

/// Reply with a fixed acknowledgment, then close the connection.
///
/// This reproduces the demo handler the gateway was modeled on (push a
/// fixed string, close after one message). It is a placeholder policy,
/// not load-bearing behavior; swap in [`Echo`] or a custom policy for
/// real deployments.
#[derive(Debug, Clone)]
pub struct AckThenClose {
    ack: Vec<u8>,
}

impl AckThenClose {
    /// Use a custom acknowledgment payload.
    pub fn new(ack: impl Into<Vec<u8>>) -> Self {
        Self { ack: ack.into() }
    }
}

impl Default for AckThenClose {
    fn default() -> Self {
        Self {
            ack: DEFAULT_ACK_PAYLOAD.to_vec(),
        }
    }
}

impl ResponsePolicy for AckThenClose {
    fn respond(&self, _frame: &Frame) -> Vec<DispatchResult> {
        vec![
            DispatchResult::Reply(self.ack.clone()),
            DispatchResult::Close,
        ]
    }
}

/// Mirror every inbound payload back to its sender and keep the
/// connection open.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl ResponsePolicy for Echo {
    fn respond(&self, frame: &Frame) -> Vec<DispatchResult> {
        vec![DispatchResult::Reply(frame.payload.clone())]
    }
}

/// Applies a [`ResponsePolicy`] to frames from live connections.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    policy: Arc<dyn ResponsePolicy>,
}

impl Dispatcher {
    /// Create a dispatcher over a shared registry.
    pub fn new(registry: Arc<ConnectionRegistry>, policy: Arc<dyn ResponsePolicy>) -> Self {
        Self { registry, policy }
    }

    /// Handle one inbound frame.
    ///
    /// Fails with [`DispatchError::UnknownConnection`] if the frame's id
    /// is not live; in that case no directive is emitted. Otherwise the
    /// policy's results are mapped onto directives for the originating
    /// connection, order preserved.
    pub fn dispatch(&self, frame: Frame) -> Result<Vec<Directive>, DispatchError> {
        if !self.registry.is_live(frame.conn) {
            return Err(DispatchError::UnknownConnection(frame.conn));
        }

        let results = self.policy.respond(&frame);
        debug!(conn = %frame.conn, bytes = frame.len(), steps = results.len(), "dispatched frame");

        let directives = results
            .into_iter()
            .filter_map(|result| match result {
                DispatchResult::Reply(payload) => Some(Directive::Push {
                    conn: frame.conn,
                    payload,
                }),
                DispatchResult::Close => Some(Directive::Close { conn: frame.conn }),
                DispatchResult::Ignore => None,
            })
            .collect();
        Ok(directives)
    }

    /// Push one payload to every live connection.
    ///
    /// Fan-out order follows sorted connection ids.
    pub fn broadcast(&self, payload: &[u8]) -> Vec<Directive> {
        self.registry
            .live_ids()
            .into_iter()
            .map(|conn| Directive::Push {
                conn,
                payload: payload.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher_with(policy: Arc<dyn ResponsePolicy>) -> (Arc<ConnectionRegistry>, Dispatcher) {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), policy);
        (registry, dispatcher)
    }

    #[test]
    fn ack_then_close_emits_push_then_close() {
        let (registry, dispatcher) = dispatcher_with(Arc::new(AckThenClose::default()));
        let id = ConnectionId::new(7);
        registry.register(id).unwrap();

        let directives = dispatcher.dispatch(Frame::text(id, "hello")).unwrap();
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
    }

    #[test]
    fn ack_payload_is_configurable() {
        let (registry, dispatcher) = dispatcher_with(Arc::new(AckThenClose::new("ok")));
        let id = ConnectionId::new(1);
        registry.register(id).unwrap();

        let directives = dispatcher.dispatch(Frame::text(id, "x")).unwrap();
        assert_eq!(
            directives[0],
            Directive::Push {
                conn: id,
                payload: b"ok".to_vec()
            }
        );
    }

    #[test]
    fn echo_mirrors_payload_without_close() {
        let (registry, dispatcher) = dispatcher_with(Arc::new(Echo));
        let id = ConnectionId::new(2);
        registry.register(id).unwrap();

        let directives = dispatcher
            .dispatch(Frame::binary(id, vec![1, 2, 3]))
            .unwrap();
        assert_eq!(
            directives,
            vec![Directive::Push {
                conn: id,
                payload: vec![1, 2, 3]
            }]
        );
    }

    #[test]
    fn unknown_connection_yields_no_directives() {
        let (_registry, dispatcher) = dispatcher_with(Arc::new(AckThenClose::default()));
        let id = ConnectionId::new(99);

        let err = dispatcher.dispatch(Frame::text(id, "x")).unwrap_err();
        assert_eq!(err, DispatchError::UnknownConnection(id));
    }

    #[test]
    fn removed_connection_is_unknown() {
        let (registry, dispatcher) = dispatcher_with(Arc::new(Echo));
        let id = ConnectionId::new(4);
        registry.register(id).unwrap();
        registry.remove(id).unwrap();

        let err = dispatcher.dispatch(Frame::text(id, "late")).unwrap_err();
        assert_eq!(err, DispatchError::UnknownConnection(id));
    }

    #[test]
    fn dispatch_is_deterministic() {
        let (registry, dispatcher) = dispatcher_with(Arc::new(AckThenClose::default()));
        let id = ConnectionId::new(5);
        registry.register(id).unwrap();

        let first = dispatcher.dispatch(Frame::text(id, "a")).unwrap();
        let second = dispatcher.dispatch(Frame::text(id, "a")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ignore_produces_no_directive() {
        struct Silent;
        impl ResponsePolicy for Silent {
            fn respond(&self, _frame: &Frame) -> Vec<DispatchResult> {
                vec![DispatchResult::Ignore]
            }
        }

        let (registry, dispatcher) = dispatcher_with(Arc::new(Silent));
        let id = ConnectionId::new(6);
        registry.register(id).unwrap();

        let directives = dispatcher.dispatch(Frame::text(id, "quiet")).unwrap();
        assert!(directives.is_empty());
    }

    #[test]
    fn broadcast_pushes_to_all_live_connections() {
        let (registry, dispatcher) = dispatcher_with(Arc::new(Echo));
        for raw in [2u64, 1, 3] {
            registry.register(ConnectionId::new(raw)).unwrap();
        }
        registry.remove(ConnectionId::new(2)).unwrap();

        let directives = dispatcher.broadcast(b"hi all");
        assert_eq!(
            directives,
            vec![
                Directive::Push {
                    conn: ConnectionId::new(1),
                    payload: b"hi all".to_vec()
                },
                Directive::Push {
                    conn: ConnectionId::new(3),
                    payload: b"hi all".to_vec()
                },
            ]
        );
    }

    #[test]
    fn broadcast_with_no_connections_is_empty() {
        let (_registry, dispatcher) = dispatcher_with(Arc::new(Echo));
        assert!(dispatcher.broadcast(b"x").is_empty());
    }
}
