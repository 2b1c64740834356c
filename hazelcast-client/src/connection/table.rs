//! The set of live connections, indexed by address, id and member.

use std::collections::HashMap;
use std::sync::Arc;

use hazelcast_core::Address;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use uuid::Uuid;

use super::{Connection, ConnectionId};

/// Outcome of [`ConnectionTable::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The connection was registered.
    Added,
    /// The same connection id was already registered.
    AlreadyPresent,
    /// Another live connection already serves this address.
    AddressTaken(ConnectionId),
}

#[derive(Debug, Default)]
struct Indexes {
    by_id: HashMap<ConnectionId, Arc<Connection>>,
    by_address: HashMap<Address, ConnectionId>,
    by_member: HashMap<Uuid, ConnectionId>,
}

impl Indexes {
    fn unindex(&mut self, id: ConnectionId) -> Option<Arc<Connection>> {
        let connection = self.by_id.remove(&id)?;
        if self.by_address.get(connection.address()) == Some(&id) {
            self.by_address.remove(connection.address());
        }
        if let Some(member) = connection.member_uuid() {
            if self.by_member.get(&member) == Some(&id) {
                self.by_member.remove(&member);
            }
        }
        Some(connection)
    }
}

/// Single source of truth for which addresses have a connection.
///
/// All three indexes sit behind one mutex so they never disagree.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    inner: Mutex<Indexes>,
}

impl ConnectionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection.
    ///
    /// At most one connection per address is kept: a second connection to an
    /// address that already has a live one is refused. A closed entry that
    /// has not been removed yet is replaced.
    pub fn add(&self, connection: Arc<Connection>) -> AddOutcome {
        let mut inner = self.inner.lock();
        let id = connection.id();
        if inner.by_id.contains_key(&id) {
            return AddOutcome::AlreadyPresent;
        }
        if let Some(existing) = inner.by_address.get(connection.address()).copied() {
            match inner.by_id.get(&existing) {
                Some(current) if current.is_alive() => return AddOutcome::AddressTaken(existing),
                _ => {
                    inner.unindex(existing);
                }
            }
        }

        inner.by_address.insert(connection.address().clone(), id);
        if let Some(member) = connection.member_uuid() {
            inner.by_member.insert(member, id);
        }
        inner.by_id.insert(id, connection);
        AddOutcome::Added
    }

    /// Removes a connection by id and returns it.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner.lock().unindex(id)
    }

    /// Removes every connection and returns them.
    pub fn clear(&self) -> Vec<Arc<Connection>> {
        let mut inner = self.inner.lock();
        inner.by_address.clear();
        inner.by_member.clear();
        inner.by_id.drain().map(|(_, c)| c).collect()
    }

    /// Returns the connection with the given id.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    /// Returns the connection to the given address.
    pub fn get_by_address(&self, address: &Address) -> Option<Arc<Connection>> {
        let inner = self.inner.lock();
        let id = inner.by_address.get(address)?;
        inner.by_id.get(id).cloned()
    }

    /// Returns the connection to the given member.
    pub fn get_by_member(&self, member: &Uuid) -> Option<Arc<Connection>> {
        let inner = self.inner.lock();
        let id = inner.by_member.get(member)?;
        inner.by_id.get(id).cloned()
    }

    /// Returns true if a connection to the address is registered.
    pub fn contains_address(&self, address: &Address) -> bool {
        self.inner.lock().by_address.contains_key(address)
    }

    /// Returns a random live connection.
    pub fn random(&self) -> Option<Arc<Connection>> {
        let inner = self.inner.lock();
        inner
            .by_id
            .values()
            .filter(|c| c.is_alive())
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    /// Returns every registered connection.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.inner.lock().by_id.values().cloned().collect()
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    /// Returns true if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDispatcher;
    use std::sync::Weak;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn open(listener: &TcpListener) -> Arc<Connection> {
        let address = Address::from(listener.local_addr().unwrap());
        let connection = Connection::connect(
            &address,
            Duration::from_secs(1),
            Weak::new(),
            Arc::new(EventDispatcher::new()),
        )
        .await
        .unwrap();
        let _ = listener.accept().await.unwrap();
        connection
    }

    #[tokio::test]
    async fn test_add_same_id_is_noop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let table = ConnectionTable::new();
        let connection = open(&listener).await;

        assert_eq!(table.add(Arc::clone(&connection)), AddOutcome::Added);
        assert_eq!(table.add(Arc::clone(&connection)), AddOutcome::AlreadyPresent);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_one_connection_per_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let table = ConnectionTable::new();
        let first = open(&listener).await;
        let second = open(&listener).await;

        assert_eq!(table.add(Arc::clone(&first)), AddOutcome::Added);
        assert_eq!(
            table.add(Arc::clone(&second)),
            AddOutcome::AddressTaken(first.id())
        );
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get_by_address(first.address()).map(|c| c.id()),
            Some(first.id())
        );
    }

    #[tokio::test]
    async fn test_closed_entry_is_replaced() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let table = ConnectionTable::new();
        let stale = open(&listener).await;
        let member = Uuid::new_v4();
        stale.set_member_uuid(member);
        let fresh = open(&listener).await;

        assert_eq!(table.add(Arc::clone(&stale)), AddOutcome::Added);
        stale.close(None);

        assert_eq!(table.add(Arc::clone(&fresh)), AddOutcome::Added);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get_by_address(fresh.address()).map(|c| c.id()),
            Some(fresh.id())
        );
        assert!(table.get_by_member(&member).is_none());
        assert!(table.remove(stale.id()).is_none());
    }

    #[tokio::test]
    async fn test_member_index_and_remove() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let table = ConnectionTable::new();
        let connection = open(&listener).await;
        let member = Uuid::new_v4();
        connection.set_member_uuid(member);
        table.add(Arc::clone(&connection));

        assert_eq!(
            table.get_by_member(&member).map(|c| c.id()),
            Some(connection.id())
        );
        assert!(table.remove(connection.id()).is_some());
        assert!(table.remove(connection.id()).is_none());
        assert!(table.get_by_member(&member).is_none());
        assert!(!table.contains_address(connection.address()));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_random_skips_closed_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let table = ConnectionTable::new();
        let connection = open(&listener).await;
        table.add(Arc::clone(&connection));

        assert!(table.random().is_some());
        connection.close(None);
        assert!(table.random().is_none());
        assert_eq!(table.clear().len(), 1);
        assert!(table.snapshot().is_empty());
    }
}
