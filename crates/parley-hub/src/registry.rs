use parley_core::types::{Identity, SessionToken};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::connection::Connection;

/// In-memory index of live connections, flat by token and grouped by identity.
///
/// Both indexes sit behind one lock and are updated in the same critical
/// section, so no reader ever sees a connection in one and not the other.
/// Readers get owned snapshots; fan-out iterates those after the lock is
/// released, never while holding it.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<SessionToken, Connection>,
    by_identity: HashMap<Identity, HashSet<SessionToken>>,
}

impl RegistryState {
    fn insert(&mut self, connection: Connection) -> Option<Connection> {
        let replaced = self.remove(connection.token().as_str());
        self.by_identity
            .entry(connection.identity().clone())
            .or_default()
            .insert(connection.token().clone());
        self.connections.insert(connection.token().clone(), connection);
        replaced
    }

    /// Drop the token from both indexes, pruning an identity left empty.
    fn remove(&mut self, token: &str) -> Option<Connection> {
        let connection = self.connections.remove(token)?;
        let identity = connection.identity().as_str();
        if let Some(tokens) = self.by_identity.get_mut(identity) {
            tokens.remove(token);
            if tokens.is_empty() {
                self.by_identity.remove(identity);
            }
        }
        Some(connection)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection under its token and identity.
    ///
    /// Last write wins: an existing registration with the same token is
    /// moved out of its identity set (which may differ) and returned.
    pub fn register(&self, connection: Connection) -> Option<Connection> {
        let token = connection.token().clone();
        let identity = connection.identity().clone();
        let conn_id = connection.conn_id().clone();

        let (replaced, total) = {
            let mut state = self.write();
            let replaced = state.insert(connection);
            (replaced, state.connections.len())
        };

        if let Some(old) = &replaced {
            info!(
                %token, %identity, %conn_id, replaced_conn_id = %old.conn_id(),
                connections = total, "connection re-registered"
            );
        } else {
            info!(%token, %identity, %conn_id, connections = total, "connection registered");
        }
        replaced
    }

    /// Remove whatever is registered under `token`. Unknown tokens are a no-op.
    pub fn unregister(&self, token: &str) -> Option<Connection> {
        let (removed, total) = {
            let mut state = self.write();
            let removed = state.remove(token);
            (removed, state.connections.len())
        };

        match &removed {
            Some(conn) => info!(
                token, identity = %conn.identity(), conn_id = %conn.conn_id(),
                connections = total, "connection unregistered"
            ),
            None => debug!(token, "unregister for unknown token ignored"),
        }
        removed
    }

    /// Transport close path: unregister `connection.token()` only while it
    /// still maps to this physical connection. A close that races with a
    /// newer same-token registration leaves the newer one in place.
    pub fn release(&self, connection: &Connection) -> bool {
        let token = connection.token().as_str();
        let (released, total) = {
            let mut state = self.write();
            let current = state
                .connections
                .get(token)
                .is_some_and(|c| c.conn_id() == connection.conn_id());
            if current {
                state.remove(token);
            }
            (current, state.connections.len())
        };

        if released {
            info!(
                token, identity = %connection.identity(), conn_id = %connection.conn_id(),
                connections = total, "connection released"
            );
        } else {
            debug!(token, conn_id = %connection.conn_id(), "stale release ignored");
        }
        released
    }

    /// Point-in-time copy of every registered connection.
    pub fn all(&self) -> Vec<Connection> {
        self.read().connections.values().cloned().collect()
    }

    /// Point-in-time copy of one identity's connections; empty if unknown.
    pub fn for_identity(&self, identity: &str) -> Vec<Connection> {
        let state = self.read();
        state
            .by_identity
            .get(identity)
            .map(|tokens| {
                tokens
                    .iter()
                    .filter_map(|t| state.connections.get(t).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, token: &str) -> Option<Connection> {
        self.read().connections.get(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().connections.is_empty()
    }

    pub fn identity_count(&self) -> usize {
        self.read().by_identity.len()
    }

    /// Identities with at least one registered connection, sorted.
    pub fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.read().by_identity.keys().cloned().collect();
        ids.sort();
        ids
    }

    // Every critical section is a complete mutation, so a poisoned lock
    // still guards a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
