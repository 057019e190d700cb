//! Inbound message frames.

use crate::connection::ConnectionId;

/// Kind of an application-level frame. The core treats both the same;
/// the distinction only matters to the transport when re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// UTF-8 text payload
    Text,
    /// Raw binary payload
    Binary,
}

/// One discrete message received from a connection.
///
/// Immutable once constructed; ownership moves into the dispatcher for
/// the duration of handling and is dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Connection the frame arrived on
    pub conn: ConnectionId,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
    /// Text or binary, as reported by the transport
    pub kind: FrameKind,
}

impl Frame {
    /// Build a text frame.
    pub fn text(conn: ConnectionId, payload: impl Into<String>) -> Self {
        Self {
            conn,
            payload: payload.into().into_bytes(),
            kind: FrameKind::Text,
        }
    }

    /// Build a binary frame.
    pub fn binary(conn: ConnectionId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            conn,
            payload: payload.into(),
            kind: FrameKind::Binary,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frame_carries_utf8_bytes() {
        let frame = Frame::text(ConnectionId::new(1), "hello");
        assert_eq!(frame.kind, FrameKind::Text);
        assert_eq!(frame.payload, b"hello");
        assert_eq!(frame.len(), 5);
    }

    #[test]
    fn binary_frame_carries_raw_bytes() {
        let frame = Frame::binary(ConnectionId::new(2), vec![0xde, 0xad]);
        assert_eq!(frame.kind, FrameKind::Binary);
        assert_eq!(frame.len(), 2);
        assert!(!frame.is_empty());
    }
}
