//! Connection registry.
//!
//! The single shared mutable resource in the core. Entries are added on
//! open and removed on close, never mutated in place, so DashMap's
//! sharded locking gives concurrent `is_live` reads alongside writes.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::warn;

use crate::connection::{Connection, ConnectionId};

/// Registry invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The id is already registered; the existing entry is untouched.
    #[error("duplicate connection {0}")]
    DuplicateConnection(ConnectionId),
    /// Removal of an id that is not present. Idempotent no-op.
    #[error("stale removal of connection {0}")]
    StaleRemoval(ConnectionId),
}

/// Tracks every live connection by id.
///
/// Owns its [`Connection`] entries exclusively; lookups hand out clones.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened connection.
    ///
    /// Fails with [`RegistryError::DuplicateConnection`] if the id is
    /// already present; the registration attempt is aborted and the
    /// existing entry is left intact.
    pub fn register(&self, id: ConnectionId) -> Result<(), RegistryError> {
        match self.connections.entry(id) {
            Entry::Occupied(_) => {
                warn!(conn = %id, "rejected duplicate registration");
                Err(RegistryError::DuplicateConnection(id))
            }
            Entry::Vacant(slot) => {
                slot.insert(Connection::new(id));
                Ok(())
            }
        }
    }

    /// Remove a connection, returning its final record.
    ///
    /// Removing an absent id is a no-op that reports
    /// [`RegistryError::StaleRemoval`]; registry state is unchanged.
    pub fn remove(&self, id: ConnectionId) -> Result<Connection, RegistryError> {
        match self.connections.remove(&id) {
            Some((_, mut conn)) => {
                conn.mark_closed();
                Ok(conn)
            }
            None => {
                warn!(conn = %id, "stale removal, id not in registry");
                Err(RegistryError::StaleRemoval(id))
            }
        }
    }

    /// Whether the id has a live entry. Safe to call concurrently with
    /// register/remove from other tasks.
    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Snapshot of one connection's record.
    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Ids of all live connections, sorted for stable iteration.
    pub fn live_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> =
            self.connections.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;

    #[test]
    fn register_then_is_live() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new(7);
        assert!(!registry.is_live(id));

        registry.register(id).unwrap();
        assert!(registry.is_live(id));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn remove_clears_liveness() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new(7);
        registry.register(id).unwrap();

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(removed.state, ConnectionState::Closed);
        assert!(!registry.is_live(id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new(3);
        registry.register(id).unwrap();

        let err = registry.register(id).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateConnection(id));
        // Original entry survives the failed attempt
        assert!(registry.is_live(id));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn double_remove_reports_stale_but_changes_nothing() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new(3);
        registry.register(id).unwrap();
        registry.remove(id).unwrap();

        let err = registry.remove(id).unwrap_err();
        assert_eq!(err, RegistryError::StaleRemoval(id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn remove_never_registered_is_stale() {
        let registry = ConnectionRegistry::new();
        let err = registry.remove(ConnectionId::new(99)).unwrap_err();
        assert_eq!(err, RegistryError::StaleRemoval(ConnectionId::new(99)));
    }

    #[test]
    fn live_ids_sorted() {
        let registry = ConnectionRegistry::new();
        for raw in [5u64, 1, 3] {
            registry.register(ConnectionId::new(raw)).unwrap();
        }
        assert_eq!(
            registry.live_ids(),
            vec![ConnectionId::new(1), ConnectionId::new(3), ConnectionId::new(5)]
        );
    }

    #[test]
    fn get_returns_snapshot() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new(1);
        registry.register(id).unwrap();

        let snapshot = registry.get(id).unwrap();
        assert!(snapshot.is_live());
        assert!(registry.get(ConnectionId::new(2)).is_none());
    }
}
