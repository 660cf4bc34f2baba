//! Fixtures shared by session tests and downstream crates' tests.
//!
//! - [`RecordingFactory`] builds [`RecordingConnection`]s that log every call
//!   and let a test emit connection events by hand.
//! - [`FailingStorage`] wraps an in-memory [`SqliteStorage`] and can be told
//!   to fail or zero out message persistence.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use relay_core::{BufferInfo, Message, MessageId, NetworkId, NewMessage, SessionValue, UserId};
use relay_store::{
    BufferLookup, NetworkInfo, SessionDataBackend, SqliteStorage, Storage, StoreError,
};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::connection::{
    ConnectionEvent, ConnectionEvents, ConnectionFactory, ConnectionSpec, NetworkConnection,
};
use crate::events::SessionEvent;
use crate::session::{CoreSession, SessionConfig};

/// User every fixture session belongs to.
pub const TEST_USER: UserId = UserId::new(1);

/// Networks registered by [`memory_storage`].
pub const TEST_NETWORKS: [&str; 2] = ["freenode", "oftc"];

/// A call made on a [`RecordingConnection`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionCall {
    /// `start()`.
    Start,
    /// `connect(name)`.
    Connect(String),
    /// `disconnect(name)`.
    Disconnect(String),
    /// `submit_input(_, target, text)`.
    Input {
        /// Buffer name.
        target: String,
        /// Input line.
        text: String,
    },
    /// `shutdown()`.
    Shutdown,
}

/// Connection that records calls and never acts on its own.
pub struct RecordingConnection {
    network: NetworkId,
    name: String,
    previous_state: Option<Value>,
    events: ConnectionEvents,
    connected: AtomicBool,
    calls: Mutex<Vec<ConnectionCall>>,
}

impl RecordingConnection {
    fn new(spec: ConnectionSpec, events: ConnectionEvents) -> Self {
        Self {
            network: spec.network,
            name: spec.name,
            previous_state: spec.previous_state,
            events,
            connected: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<ConnectionCall> {
        self.calls.lock().clone()
    }

    /// How many times `call` was made.
    pub fn count(&self, call: &ConnectionCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// State the connection was created with.
    pub fn previous_state(&self) -> Option<Value> {
        self.previous_state.clone()
    }

    /// Report an event to the session, tracking connectivity.
    pub fn emit(&self, event: ConnectionEvent) -> bool {
        match event {
            ConnectionEvent::Connected => self.connected.store(true, Ordering::SeqCst),
            ConnectionEvent::Disconnected => self.connected.store(false, Ordering::SeqCst),
            _ => {}
        }
        self.events.emit(event)
    }

    fn record(&self, call: ConnectionCall) {
        self.calls.lock().push(call);
    }
}

impl NetworkConnection for RecordingConnection {
    fn network_id(&self) -> NetworkId {
        self.network
    }

    fn network_name(&self) -> &str {
        &self.name
    }

    fn start(&self) {
        self.record(ConnectionCall::Start);
    }

    fn connect(&self, name: &str) {
        self.record(ConnectionCall::Connect(name.to_owned()));
    }

    fn disconnect(&self, name: &str) {
        self.record(ConnectionCall::Disconnect(name.to_owned()));
    }

    fn submit_input(&self, _network: NetworkId, target: &str, text: &str) {
        self.record(ConnectionCall::Input {
            target: target.to_owned(),
            text: text.to_owned(),
        });
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn state(&self) -> Value {
        self.previous_state
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "name": self.name }))
    }

    fn shutdown(&self) {
        self.record(ConnectionCall::Shutdown);
    }
}

/// Factory keeping every connection it builds.
#[derive(Default)]
pub struct RecordingFactory {
    created: Mutex<Vec<Arc<RecordingConnection>>>,
}

impl RecordingFactory {
    /// Empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connection built so far, in creation order.
    pub fn connections(&self) -> Vec<Arc<RecordingConnection>> {
        self.created.lock().clone()
    }

    /// Most recent connection built for `name`.
    pub fn connection(&self, name: &str) -> Option<Arc<RecordingConnection>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Number of connections built.
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl ConnectionFactory for RecordingFactory {
    fn create(&self, spec: ConnectionSpec, events: ConnectionEvents) -> Arc<dyn NetworkConnection> {
        let connection = Arc::new(RecordingConnection::new(spec, events));
        self.created.lock().push(Arc::clone(&connection));
        connection
    }
}

/// In-memory storage with switchable persistence faults.
pub struct FailingStorage {
    inner: SqliteStorage,
    fail_persist: AtomicBool,
    zero_ids: AtomicBool,
}

impl FailingStorage {
    /// Wrap a fresh in-memory store with [`TEST_NETWORKS`] registered.
    pub fn new() -> Self {
        Self {
            inner: seeded_storage(),
            fail_persist: AtomicBool::new(false),
            zero_ids: AtomicBool::new(false),
        }
    }

    /// Make `persist_message` fail.
    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    /// Make `persist_message` return id 0.
    pub fn return_zero_ids(&self, zero: bool) {
        self.zero_ids.store(zero, Ordering::SeqCst);
    }
}

impl Default for FailingStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for FailingStorage {
    fn resolve_network_id(&self, user: UserId, name: &str) -> relay_store::Result<Option<NetworkId>> {
        self.inner.resolve_network_id(user, name)
    }

    fn ensure_network(&self, user: UserId, name: &str) -> relay_store::Result<NetworkId> {
        self.inner.ensure_network(user, name)
    }

    fn list_networks(&self, user: UserId) -> relay_store::Result<Vec<NetworkInfo>> {
        self.inner.list_networks(user)
    }

    fn get_or_create_buffer(
        &self,
        user: UserId,
        network: NetworkId,
        name: &str,
    ) -> relay_store::Result<BufferLookup> {
        self.inner.get_or_create_buffer(user, network, name)
    }

    fn list_buffers(&self, user: UserId) -> relay_store::Result<Vec<BufferInfo>> {
        self.inner.list_buffers(user)
    }

    fn persist_message(&self, message: &NewMessage) -> relay_store::Result<MessageId> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound("message table".into()));
        }
        if self.zero_ids.load(Ordering::SeqCst) {
            return Ok(MessageId::new(0));
        }
        self.inner.persist_message(message)
    }

    fn fetch_messages(
        &self,
        buffer: &BufferInfo,
        start: MessageId,
        end: Option<MessageId>,
    ) -> relay_store::Result<Vec<Message>> {
        self.inner.fetch_messages(buffer, start, end)
    }

    fn save_session_state(&self, user: UserId, state: &Value) -> relay_store::Result<()> {
        self.inner.save_session_state(user, state)
    }

    fn load_session_state(&self, user: UserId) -> relay_store::Result<Option<Value>> {
        self.inner.load_session_state(user)
    }
}

impl SessionDataBackend for FailingStorage {
    fn load_session_data(&self, user: UserId) -> relay_store::Result<BTreeMap<String, SessionValue>> {
        self.inner.load_session_data(user)
    }

    fn store_session_data(
        &self,
        user: UserId,
        key: &str,
        value: &SessionValue,
    ) -> relay_store::Result<()> {
        self.inner.store_session_data(user, key, value)
    }
}

fn seeded_storage() -> SqliteStorage {
    let storage = match SqliteStorage::open_in_memory() {
        Ok(storage) => storage,
        Err(e) => panic!("in-memory storage: {e}"),
    };
    for name in TEST_NETWORKS {
        if let Err(e) = storage.ensure_network(TEST_USER, name) {
            panic!("seeding network {name}: {e}");
        }
    }
    storage
}

/// Fresh in-memory storage with [`TEST_NETWORKS`] registered for [`TEST_USER`].
pub fn memory_storage() -> Arc<SqliteStorage> {
    Arc::new(seeded_storage())
}

/// Session for [`TEST_USER`] over `storage`, with a backlog chunk of 5.
pub fn session_with<S>(storage: Arc<S>, factory: Arc<dyn ConnectionFactory>) -> CoreSession
where
    S: Storage + SessionDataBackend + 'static,
{
    let config = SessionConfig {
        user: TEST_USER,
        ..SessionConfig::default()
    };
    match CoreSession::new(config, Arc::clone(&storage) as Arc<dyn Storage>, storage, factory) {
        Ok(session) => session,
        Err(e) => panic!("session setup: {e}"),
    }
}

/// Every event currently queued on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
