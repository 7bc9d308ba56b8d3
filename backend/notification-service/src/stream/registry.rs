/// Subscription registry
///
/// Tracks the open stream connections of every online user.
/// - Per-user sets are immutable `Arc` vectors replaced on every change (copy-on-write),
///   so a snapshot is a reference-count bump and fan-out never iterates a live set
/// - The outer map is sharded (`DashMap`), no global lock is held across I/O
/// - A user with no connections left has no entry
use std::ops::Deref;
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use super::{ConnectionId, StreamConnection};

type ConnectionSet = Arc<Vec<Arc<StreamConnection>>>;

/// Immutable point-in-time copy of one user's connections
#[derive(Debug, Clone, Default)]
pub struct ConnectionSnapshot(ConnectionSet);

impl Deref for ConnectionSnapshot {
    type Target = [Arc<StreamConnection>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<DashMap<Uuid, ConnectionSet>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for the expected online population
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::with_capacity(capacity)),
        }
    }

    /// Add a connection to its user's set, creating the set if needed
    pub fn register(&self, connection: Arc<StreamConnection>) {
        let user_id = connection.user_id();
        let mut entry = self.inner.entry(user_id).or_default();

        let mut next = Vec::with_capacity(entry.len() + 1);
        next.extend(entry.iter().cloned());
        next.push(connection);
        *entry = Arc::new(next);

        tracing::debug!(
            user_id = %user_id,
            connections = entry.len(),
            "registered stream connection"
        );
    }

    /// Remove a connection; removing an absent connection is a no-op
    ///
    /// Returns true if the connection was present.
    pub fn unregister(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        match self.inner.entry(user_id) {
            Entry::Occupied(mut entry) => {
                if !entry.get().iter().any(|c| c.id() == connection_id) {
                    return false;
                }

                let remaining: Vec<_> = entry
                    .get()
                    .iter()
                    .filter(|c| c.id() != connection_id)
                    .cloned()
                    .collect();

                if remaining.is_empty() {
                    entry.remove();
                    tracing::debug!(user_id = %user_id, "removed empty subscription entry");
                } else {
                    tracing::debug!(
                        user_id = %user_id,
                        connections = remaining.len(),
                        "unregistered stream connection"
                    );
                    entry.insert(Arc::new(remaining));
                }
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Point-in-time copy of a user's connections, empty if the user is offline
    pub fn snapshot(&self, user_id: Uuid) -> ConnectionSnapshot {
        self.inner
            .get(&user_id)
            .map(|set| ConnectionSnapshot(Arc::clone(set.value())))
            .unwrap_or_default()
    }

    /// Every registered connection, used to drive shutdown
    pub fn all_connections(&self) -> Vec<Arc<StreamConnection>> {
        self.inner
            .iter()
            .flat_map(|set| set.value().iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner.get(&user_id).map(|set| set.len()).unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.inner.iter().map(|set| set.len()).sum()
    }

    pub fn connected_users_count(&self) -> usize {
        self.inner.len()
    }

    pub fn connected_user_ids(&self) -> Vec<Uuid> {
        self.inner.iter().map(|set| *set.key()).collect()
    }

    pub fn is_registered(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        self.inner
            .get(&user_id)
            .map(|set| set.iter().any(|c| c.id() == connection_id))
            .unwrap_or(false)
    }
}
