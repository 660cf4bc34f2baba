//! The per-user session actor.
//!
//! [`CoreSession`] owns the registry, router, backlog dispatcher and session
//! data of one user. A single task runs it and handles [`SessionCommand`]s
//! one at a time: client requests arrive as closures sent by a
//! [`SessionHandle`], connection callbacks arrive through each connection's
//! [`ConnectionEvents`](crate::connection::ConnectionEvents) sink. After every
//! command the deferred teardown pass runs.
//!
//! Every failing operation is logged and published as a `session.error`
//! event before its error is returned.

use std::sync::Arc;

use relay_core::{BufferInfo, NetworkId, SessionValue, UserId};
use relay_store::{SessionDataBackend, Storage, StoreError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::backlog::{BacklogDispatcher, BacklogRange, BacklogSent, DEFAULT_CHUNK_SIZE};
use crate::connection::{ConnectionEvent, ConnectionFactory};
use crate::context::SessionContext;
use crate::errors::{Result, SessionError};
use crate::events::{DEFAULT_CAPACITY, EventEmitter, SessionEvent};
use crate::registry::{NetworkRegistry, NetworkStateReport};
use crate::router::MessageRouter;
use crate::script;
use crate::session_data::SessionDataStore;
use crate::snapshot::{self, RestoreReport, SessionSnapshot};

/// Session construction parameters.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Session owner.
    pub user: UserId,
    /// Messages per backlog chunk.
    pub backlog_chunk_size: usize,
    /// Broadcast channel capacity.
    pub event_capacity: usize,
    /// Persist a snapshot when the session task stops.
    pub persist_on_shutdown: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: UserId::new(1),
            backlog_chunk_size: DEFAULT_CHUNK_SIZE,
            event_capacity: DEFAULT_CAPACITY,
            persist_on_shutdown: true,
        }
    }
}

type Job = Box<dyn FnOnce(&mut CoreSession) + Send>;

/// Unit of work for the session task.
pub(crate) enum SessionCommand {
    /// Run a closure against the session.
    Invoke(Job),
    /// An event reported by the connection of `network`.
    Connection {
        network: NetworkId,
        generation: u64,
        event: ConnectionEvent,
    },
}

/// State and operations of one user's session.
pub struct CoreSession {
    ctx: Arc<SessionContext>,
    config: SessionConfig,
    session_data: Arc<SessionDataStore>,
    registry: NetworkRegistry,
    router: MessageRouter,
    backlog: BacklogDispatcher,
    tx: mpsc::UnboundedSender<SessionCommand>,
    rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl CoreSession {
    /// Build a session and load its session data.
    pub fn new(
        config: SessionConfig,
        storage: Arc<dyn Storage>,
        data_backend: Arc<dyn SessionDataBackend>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let events = Arc::new(EventEmitter::with_capacity(config.event_capacity));
        let ctx = Arc::new(SessionContext {
            user: config.user,
            storage,
            events: Arc::clone(&events),
        });
        let session_data = Arc::new(SessionDataStore::load(config.user, data_backend, events)?);
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = NetworkRegistry::new(Arc::clone(&ctx), factory, tx.clone());
        let router = MessageRouter::new(Arc::clone(&ctx));
        let backlog = BacklogDispatcher::new(Arc::clone(&ctx), config.backlog_chunk_size);
        info!(user = %config.user, "session created");
        Ok(Self {
            ctx,
            config,
            session_data,
            registry,
            router,
            backlog,
            tx,
            rx,
        })
    }

    /// Session owner.
    pub fn user(&self) -> UserId {
        self.ctx.user
    }

    /// Outbound event emitter.
    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.ctx.events
    }

    /// Subscribe to outbound events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.ctx.events.subscribe()
    }

    /// Shared session data store.
    pub fn session_data_store(&self) -> &Arc<SessionDataStore> {
        &self.session_data
    }

    /// Network registry.
    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Handle for talking to this session once it runs.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
            events: Arc::clone(&self.ctx.events),
            session_data: Arc::clone(&self.session_data),
            user: self.ctx.user,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Connect to the network called `name`.
    pub fn connect_to_network(&mut self, name: &str) -> Result<NetworkId> {
        let result = self.registry.connect_to_network(name, None);
        self.reported(result)
    }

    /// Disconnect from the network called `name`.
    pub fn disconnect_from_network(&mut self, name: &str) -> Result<NetworkId> {
        let result = self.registry.disconnect_from_network(name);
        self.reported(result)
    }

    /// Forward user input for `buffer` to its connection.
    pub fn send_input(&mut self, buffer: &BufferInfo, text: &str) -> Result<()> {
        let result = self.registry.send_input(buffer, text);
        self.reported(result)
    }

    /// Emit the backlog of `buffer` in chunks.
    pub fn request_backlog(&mut self, buffer: &BufferInfo, range: BacklogRange) -> Result<BacklogSent> {
        let result = self.backlog.request_backlog(buffer, range);
        self.reported(result)
    }

    /// Write a session data entry.
    pub fn set_session_data(&mut self, key: &str, value: SessionValue) -> Result<()> {
        let result = self.session_data.set(key, value);
        self.reported(result)
    }

    /// Read a session data entry, or `default`.
    pub fn session_data(&self, key: &str, default: SessionValue) -> SessionValue {
        self.session_data.get(key, default)
    }

    /// Report the state of every registered connection.
    pub fn network_states(&mut self) -> Vec<NetworkStateReport> {
        self.registry.network_states()
    }

    /// Evaluate an expression and emit its result.
    ///
    /// On failure the error text is emitted as the result as well.
    pub fn evaluate(&mut self, expression: &str) -> Result<String> {
        let result = script::evaluate(self.ctx.storage.as_ref(), self.ctx.user, expression);
        let text = match &result {
            Ok(text) => text.clone(),
            Err(e) => e.to_string(),
        };
        self.ctx.emit(SessionEvent::EvaluationResult { text });
        self.reported(result)
    }

    /// Every buffer of the user.
    pub fn list_buffers(&mut self) -> Result<Vec<BufferInfo>> {
        let result = self
            .ctx
            .storage
            .list_buffers(self.ctx.user)
            .map_err(SessionError::from);
        self.reported(result)
    }

    /// Capture the current session state.
    pub fn capture(&mut self) -> Result<SessionSnapshot> {
        let result = snapshot::capture(&self.ctx, &self.registry, &self.session_data);
        self.reported(result)
    }

    /// Reconnect the networks recorded in `snapshot`.
    #[instrument(skip_all, fields(user = %self.ctx.user))]
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> RestoreReport {
        snapshot::restore(&self.ctx, &mut self.registry, snapshot)
    }

    /// Capture and store a snapshot.
    pub fn persist_snapshot(&mut self) -> Result<()> {
        let snapshot = self.capture()?;
        let result = self
            .ctx
            .storage
            .save_session_state(self.ctx.user, &snapshot.to_value())
            .map_err(SessionError::from);
        if result.is_ok() {
            debug!(
                user = %self.ctx.user,
                connected = snapshot.connected.len(),
                "session snapshot stored"
            );
        }
        self.reported(result)
    }

    /// Snapshot stored by a previous session, if any.
    pub fn load_persisted(&self) -> Result<Option<SessionSnapshot>> {
        let Some(value) = self.ctx.storage.load_session_state(self.ctx.user)? else {
            return Ok(None);
        };
        let snapshot = SessionSnapshot::from_value(value).map_err(StoreError::from)?;
        Ok(Some(snapshot))
    }

    /// Restore the snapshot stored by a previous session.
    pub fn restore_persisted(&mut self) -> Result<RestoreReport> {
        let result = self.load_persisted();
        match self.reported(result)? {
            Some(snapshot) => Ok(self.restore(&snapshot)),
            None => {
                debug!(user = %self.ctx.user, "no stored session snapshot");
                Ok(RestoreReport::default())
            }
        }
    }

    /// The connection of `network` came up.
    pub fn server_connected(&mut self, network: NetworkId) -> Result<()> {
        let result = self.registry.server_connected(network);
        self.reported(result)
    }

    /// The connection of `network` went down.
    pub fn server_disconnected(&mut self, network: NetworkId) -> Result<()> {
        let result = self.registry.server_disconnected(network);
        self.reported(result)
    }

    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.ctx.report(e);
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────

    fn handle_connection_event(&mut self, network: NetworkId, generation: u64, event: ConnectionEvent) {
        match self.registry.generation(network) {
            Some(current) if current != generation => {
                debug!(network = %network, generation, current, "event from replaced connection dropped");
                return;
            }
            _ => {}
        }
        let Some(name) = self
            .registry
            .get(network)
            .map(|handle| handle.network_name().to_owned())
        else {
            if event == ConnectionEvent::Disconnected {
                let _ = self.server_disconnected(network);
            } else {
                debug!(network = %network, "event from unregistered network dropped");
            }
            return;
        };

        match event {
            ConnectionEvent::Connected => {
                let _ = self.server_connected(network);
            }
            ConnectionEvent::Disconnected => {
                let _ = self.server_disconnected(network);
            }
            ConnectionEvent::MessageReceived(inbound) => {
                let result = self.router.on_message_from_connection(network, inbound);
                let _ = self.reported(result);
            }
            ConnectionEvent::StatusMessage { text } => {
                self.router.on_status_message_from_connection(&name, text);
            }
            ConnectionEvent::StateChanged { state } => {
                self.ctx.emit(SessionEvent::NetworkState {
                    network,
                    name,
                    state,
                });
            }
        }
    }

    fn dispatch(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Invoke(job) => job(self),
            SessionCommand::Connection {
                network,
                generation,
                event,
            } => {
                self.handle_connection_event(network, generation, event);
            }
        }
        let reaped = self.registry.reap();
        if reaped > 0 {
            debug!(reaped, "connections torn down");
        }
    }

    /// Handle every queued command without waiting. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(command) = self.rx.try_recv() {
            self.dispatch(command);
            count += 1;
        }
        count
    }

    /// Serve commands until `cancel` fires, then persist and tear down.
    #[instrument(skip_all, fields(user = %self.ctx.user))]
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("session running");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                command = self.rx.recv() => match command {
                    Some(command) => self.dispatch(command),
                    None => break,
                },
            }
        }

        let _ = self.process_pending();
        if self.config.persist_on_shutdown {
            if let Err(e) = self.persist_snapshot() {
                error!(error = %e, "failed to store session snapshot");
            }
        }
        let closed = self.registry.shutdown_all();
        info!(closed, "session stopped");
    }

    /// Run the session on a new task.
    pub fn spawn(self, cancel: CancellationToken) -> (SessionHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run(cancel));
        (handle, task)
    }
}

/// Cloneable client of a running [`CoreSession`].
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
    events: Arc<EventEmitter>,
    session_data: Arc<SessionDataStore>,
    user: UserId,
}

impl SessionHandle {
    /// Run `f` on the session task and return its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut CoreSession) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let _ = reply_tx.send(f(session));
        });
        self.tx
            .send(SessionCommand::Invoke(job))
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }

    /// Session owner.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Subscribe to outbound events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Outbound event emitter.
    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }

    /// Whether the session task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// See [`CoreSession::network_states`].
    pub async fn network_states(&self) -> Result<Vec<NetworkStateReport>> {
        self.call(CoreSession::network_states).await
    }

    /// See [`CoreSession::connect_to_network`].
    pub async fn connect(&self, name: String) -> Result<NetworkId> {
        self.call(move |s| s.connect_to_network(&name)).await?
    }

    /// See [`CoreSession::disconnect_from_network`].
    pub async fn disconnect(&self, name: String) -> Result<NetworkId> {
        self.call(move |s| s.disconnect_from_network(&name)).await?
    }

    /// See [`CoreSession::send_input`].
    pub async fn send_input(&self, buffer: BufferInfo, text: String) -> Result<()> {
        self.call(move |s| s.send_input(&buffer, &text)).await?
    }

    /// See [`CoreSession::request_backlog`].
    pub async fn request_backlog(&self, buffer: BufferInfo, range: BacklogRange) -> Result<BacklogSent> {
        self.call(move |s| s.request_backlog(&buffer, range)).await?
    }

    /// See [`CoreSession::evaluate`].
    pub async fn evaluate(&self, expression: String) -> Result<String> {
        self.call(move |s| s.evaluate(&expression)).await?
    }

    /// See [`CoreSession::list_buffers`].
    pub async fn list_buffers(&self) -> Result<Vec<BufferInfo>> {
        self.call(CoreSession::list_buffers).await?
    }

    /// See [`CoreSession::capture`].
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.call(CoreSession::capture).await?
    }

    /// Registered network ids.
    pub async fn registered_networks(&self) -> Result<Vec<NetworkId>> {
        self.call(|s| s.registry().network_ids()).await
    }

    /// Write a session data entry on the session task.
    pub async fn set_session_data(&self, key: String, value: SessionValue) -> Result<()> {
        self.call(move |s| s.set_session_data(&key, value)).await?
    }

    /// Read a session data entry.
    pub fn session_data(&self, key: &str) -> Option<SessionValue> {
        self.session_data.try_get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingFactory, TEST_USER, drain, memory_storage, session_with};
    use assert_matches::assert_matches;

    #[test]
    fn unknown_network_is_reported() {
        let storage = memory_storage();
        let mut session = session_with(storage, Arc::new(RecordingFactory::new()));
        let mut rx = session.subscribe();
        assert_matches!(
            session.connect_to_network("nowhere"),
            Err(SessionError::NetworkUnresolved { .. })
        );
        assert!(session.registry().is_empty());
        let events = drain(&mut rx);
        assert_matches!(
            events.as_slice(),
            [SessionEvent::Error { category, .. }] if category == "network_unresolved"
        );
    }

    #[test]
    fn disconnect_for_unregistered_network_is_invariant() {
        let mut session = session_with(memory_storage(), Arc::new(RecordingFactory::new()));
        let mut rx = session.subscribe();
        assert_matches!(
            session.server_disconnected(NetworkId::new(42)),
            Err(SessionError::Invariant { .. })
        );
        let events = drain(&mut rx);
        assert_matches!(
            events.as_slice(),
            [SessionEvent::Error { category, .. }] if category == "invariant"
        );
    }

    #[test]
    fn evaluate_emits_result_on_error_too() {
        let mut session = session_with(memory_storage(), Arc::new(RecordingFactory::new()));
        let mut rx = session.subscribe();
        assert!(session.evaluate("((").is_err());
        let events = drain(&mut rx);
        assert_matches!(events.first(), Some(SessionEvent::EvaluationResult { text }) if text.starts_with("Evaluation error"));
        assert_matches!(events.get(1), Some(SessionEvent::Error { category, .. }) if category == "evaluation");
    }

    #[test]
    fn timestamp_backlog_is_unsupported() {
        let storage = memory_storage();
        let network = storage.resolve_network_id(TEST_USER, "freenode").unwrap().unwrap();
        let buffer = storage
            .get_or_create_buffer(TEST_USER, network, "#rust")
            .unwrap()
            .buffer;
        let mut session = session_with(storage, Arc::new(RecordingFactory::new()));
        let mut rx = session.subscribe();
        let range = BacklogRange::Timestamps {
            start: chrono::Utc::now(),
            end: None,
        };
        assert_matches!(
            session.request_backlog(&buffer, range),
            Err(SessionError::Unsupported(_))
        );
        assert!(
            drain(&mut rx)
                .iter()
                .all(|e| !matches!(e, SessionEvent::BacklogChunk { .. }))
        );
    }

    #[tokio::test]
    async fn handle_round_trip() {
        let session = session_with(memory_storage(), Arc::new(RecordingFactory::new()));
        let cancel = CancellationToken::new();
        let (handle, task) = session.spawn(cancel.clone());

        let id = handle.connect("freenode".into()).await.unwrap();
        assert_eq!(handle.registered_networks().await.unwrap(), vec![id]);
        handle
            .set_session_data("theme".into(), "dark".into())
            .await
            .unwrap();
        assert_eq!(handle.session_data("theme"), Some(SessionValue::from("dark")));

        cancel.cancel();
        task.await.unwrap();
        assert!(handle.is_closed());
        assert_matches!(handle.list_buffers().await, Err(SessionError::Closed));
    }
}
