//! Connection identity and lifecycle state.

use chrono::{DateTime, Utc};

/// Opaque identifier for one client connection.
///
/// The transport allocates these; the core only compares them. They are
/// never reused, so a closed id stays closed forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id from the transport.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value, for logging and diagnostics.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a connection. Open is initial, Closed is terminal;
/// the transition is one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is active and may receive pushes
    Open,
    /// Connection has been closed; the id will not come back
    Closed,
}

/// One live connection as tracked by the registry.
///
/// Owned exclusively by the [`ConnectionRegistry`]; callers get clones,
/// never shared references into the map.
///
/// [`ConnectionRegistry`]: crate::ConnectionRegistry
#[derive(Debug, Clone)]
pub struct Connection {
    /// Connection identifier assigned by the transport
    pub id: ConnectionId,
    /// When the open event was recorded
    pub opened_at: DateTime<Utc>,
    /// Current lifecycle state
    pub state: ConnectionState,
}

impl Connection {
    /// Record a freshly opened connection.
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            opened_at: Utc::now(),
            state: ConnectionState::Open,
        }
    }

    /// Whether the connection is still open.
    pub fn is_live(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Mark the connection closed. Irreversible.
    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_is_live() {
        let conn = Connection::new(ConnectionId::new(1));
        assert!(conn.is_live());
        assert_eq!(conn.state, ConnectionState::Open);
    }

    #[test]
    fn mark_closed_is_terminal() {
        let mut conn = Connection::new(ConnectionId::new(1));
        conn.mark_closed();
        assert!(!conn.is_live());
        assert_eq!(conn.state, ConnectionState::Closed);
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "#7");
        assert_eq!(ConnectionId::from(42).raw(), 42);
    }
}
