//! [`SqliteStorage`]: the pooled `SQLite` implementation of the storage traits.
//!
//! Each call checks a connection out of the pool, runs one repository
//! operation and returns it.

use std::collections::BTreeMap;

use relay_core::{BufferInfo, Message, MessageId, NetworkId, NewMessage, SessionValue, UserId};
use serde_json::Value;

use crate::errors::Result;
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::{
    BufferRepo, MessageRepo, NetworkRepo, SessionDataRepo, SessionStateRepo,
};
use crate::traits::{BufferLookup, NetworkInfo, SessionDataBackend, Storage};

/// Storage backed by a `SQLite` connection pool.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: ConnectionPool,
}

impl SqliteStorage {
    /// Wrap an already-migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file and bring its schema up to date.
    pub fn open_file(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self::new(pool))
    }

    /// Fresh migrated in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self::new(pool))
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }
}

impl Storage for SqliteStorage {
    fn resolve_network_id(&self, user: UserId, name: &str) -> Result<Option<NetworkId>> {
        NetworkRepo::resolve(&*self.conn()?, user, name)
    }

    fn ensure_network(&self, user: UserId, name: &str) -> Result<NetworkId> {
        NetworkRepo::ensure(&*self.conn()?, user, name)
    }

    fn list_networks(&self, user: UserId) -> Result<Vec<NetworkInfo>> {
        NetworkRepo::list(&*self.conn()?, user)
    }

    fn get_or_create_buffer(
        &self,
        user: UserId,
        network: NetworkId,
        name: &str,
    ) -> Result<BufferLookup> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let lookup = BufferRepo::get_or_create(&tx, user, network, name)?;
        tx.commit()?;
        Ok(lookup)
    }

    fn list_buffers(&self, user: UserId) -> Result<Vec<BufferInfo>> {
        BufferRepo::list(&*self.conn()?, user)
    }

    fn persist_message(&self, message: &NewMessage) -> Result<MessageId> {
        MessageRepo::insert(&*self.conn()?, message)
    }

    fn fetch_messages(
        &self,
        buffer: &BufferInfo,
        start: MessageId,
        end: Option<MessageId>,
    ) -> Result<Vec<Message>> {
        MessageRepo::fetch_range(&*self.conn()?, buffer, start, end)
    }

    fn save_session_state(&self, user: UserId, state: &Value) -> Result<()> {
        SessionStateRepo::save(&*self.conn()?, user, state)
    }

    fn load_session_state(&self, user: UserId) -> Result<Option<Value>> {
        SessionStateRepo::load(&*self.conn()?, user)
    }
}

impl SessionDataBackend for SqliteStorage {
    fn load_session_data(&self, user: UserId) -> Result<BTreeMap<String, SessionValue>> {
        SessionDataRepo::load_all(&*self.conn()?, user)
    }

    fn store_session_data(&self, user: UserId, key: &str, value: &SessionValue) -> Result<()> {
        SessionDataRepo::upsert(&*self.conn()?, user, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StorageQuery;
    use relay_core::{MessageFlags, MessageType};

    #[test]
    fn end_to_end_buffer_and_messages() {
        let store = SqliteStorage::open_in_memory().unwrap();
        let user = UserId::new(1);
        let net = store.ensure_network(user, "freenode").unwrap();
        let buffer = store.get_or_create_buffer(user, net, "#rust").unwrap().buffer;
        let id = store
            .persist_message(&NewMessage::new(
                buffer.clone(),
                MessageType::Plain,
                "hello",
                "bob",
                MessageFlags::NONE,
            ))
            .unwrap();
        let fetched = store.fetch_messages(&buffer, id, None).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, id);
    }

    #[test]
    fn storage_query_is_read_view() {
        let store = SqliteStorage::open_in_memory().unwrap();
        let user = UserId::new(1);
        let net = store.ensure_network(user, "oftc").unwrap();
        let _ = store.get_or_create_buffer(user, net, "#debian").unwrap();
        let query: &dyn StorageQuery = &store;
        assert_eq!(query.networks(user).unwrap()[0].name, "oftc");
        assert_eq!(query.buffers(user).unwrap()[0].name, "#debian");
    }

    #[test]
    fn file_storage_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");
        let path = path.to_str().unwrap();
        let user = UserId::new(1);
        {
            let store = SqliteStorage::open_file(path, &ConnectionConfig::default()).unwrap();
            store.store_session_data(user, "k", &SessionValue::from(true)).unwrap();
        }
        let store = SqliteStorage::open_file(path, &ConnectionConfig::default()).unwrap();
        let data = store.load_session_data(user).unwrap();
        assert_eq!(data["k"], SessionValue::Bool(true));
    }
}
