//! Per-user session data: a durable key/value map mirrored in memory.
//!
//! The store is shared with the transport layer, so reads and writes can
//! happen outside the session task. A single lock covers both the in-memory
//! map and the durable write, so persistence of concurrent `set` calls is
//! serialized and memory never runs ahead of storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::{SessionValue, UserId};
use relay_store::SessionDataBackend;
use tracing::{debug, instrument};

use crate::errors::Result;
use crate::events::{EventEmitter, SessionEvent};

/// In-memory mirror of a user's durable session data.
pub struct SessionDataStore {
    user: UserId,
    backend: Arc<dyn SessionDataBackend>,
    events: Arc<EventEmitter>,
    entries: Mutex<BTreeMap<String, SessionValue>>,
}

impl SessionDataStore {
    /// Load every persisted entry of `user`.
    pub fn load(
        user: UserId,
        backend: Arc<dyn SessionDataBackend>,
        events: Arc<EventEmitter>,
    ) -> Result<Self> {
        let store = Self {
            user,
            backend,
            events,
            entries: Mutex::new(BTreeMap::new()),
        };
        {
            let mut entries = store.entries.lock();
            *entries = store.backend.load_session_data(user)?;
            debug!(user = %user, count = entries.len(), "session data loaded");
        }
        Ok(store)
    }

    /// Value for `key`, or `default` when absent.
    pub fn get(&self, key: &str, default: SessionValue) -> SessionValue {
        self.try_get(key).unwrap_or(default)
    }

    /// Value for `key`.
    pub fn try_get(&self, key: &str) -> Option<SessionValue> {
        self.entries.lock().get(key).cloned()
    }

    /// Copy of all entries.
    pub fn entries(&self) -> BTreeMap<String, SessionValue> {
        self.entries.lock().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Write through to storage, then memory, then notify listeners.
    ///
    /// On a storage failure nothing changes and nothing is emitted.
    #[instrument(skip(self, value), fields(user = %self.user))]
    pub fn set(&self, key: &str, value: SessionValue) -> Result<()> {
        {
            let mut entries = self.entries.lock();
            self.backend.store_session_data(self.user, key, &value)?;
            let _ = entries.insert(key.to_owned(), value.clone());
        }
        let _ = self.events.emit(SessionEvent::SessionDataChanged {
            key: key.to_owned(),
            value,
        });
        let _ = self.events.emit(SessionEvent::SessionDataKeyChanged {
            key: key.to_owned(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SessionError;
    use assert_matches::assert_matches;
    use relay_store::{SqliteStorage, StoreError};

    struct BrokenBackend;

    impl SessionDataBackend for BrokenBackend {
        fn load_session_data(
            &self,
            _user: UserId,
        ) -> relay_store::Result<BTreeMap<String, SessionValue>> {
            Ok(BTreeMap::new())
        }

        fn store_session_data(
            &self,
            _user: UserId,
            _key: &str,
            _value: &SessionValue,
        ) -> relay_store::Result<()> {
            Err(StoreError::NotFound("session_data".into()))
        }
    }

    fn store(backend: Arc<dyn SessionDataBackend>) -> (SessionDataStore, Arc<EventEmitter>) {
        let events = Arc::new(EventEmitter::new());
        let store = SessionDataStore::load(UserId::new(1), backend, Arc::clone(&events)).unwrap();
        (store, events)
    }

    #[test]
    fn set_then_get() {
        let (store, _) = store(Arc::new(SqliteStorage::open_in_memory().unwrap()));
        store.set("theme", "dark".into()).unwrap();
        assert_eq!(store.try_get("theme"), Some(SessionValue::from("dark")));
        assert_eq!(store.get("missing", 7_i64.into()), SessionValue::Integer(7));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_emits_both_notifications_in_order() {
        let (store, events) = store(Arc::new(SqliteStorage::open_in_memory().unwrap()));
        let mut rx = events.subscribe();
        store.set("k", true.into()).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::SessionDataChanged {
                key: "k".into(),
                value: SessionValue::Bool(true)
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::SessionDataKeyChanged { key: "k".into() }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reload_sees_written_values() {
        let backend = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let (first, _) = store(Arc::clone(&backend) as Arc<dyn SessionDataBackend>);
        first.set("geometry", "800x600".into()).unwrap();
        drop(first);

        let (second, _) = store(backend);
        assert_eq!(second.try_get("geometry"), Some(SessionValue::from("800x600")));
    }

    #[test]
    fn failed_write_changes_nothing() {
        let (store, events) = store(Arc::new(BrokenBackend));
        let mut rx = events.subscribe();
        assert_matches!(store.set("k", 1_i64.into()), Err(SessionError::Storage(_)));
        assert!(store.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn concurrent_writers_all_land() {
        let backend = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let (store, _) = store(Arc::clone(&backend) as Arc<dyn SessionDataBackend>);
        let store = Arc::new(store);
        let handles: Vec<_> = (0..4_i64)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.set(&format!("k{i}"), i.into()).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 4);
        assert_eq!(backend.load_session_data(UserId::new(1)).unwrap().len(), 4);
    }
}
