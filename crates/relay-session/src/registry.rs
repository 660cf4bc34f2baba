//! Network registry: the set of live connections and their lifecycle.
//!
//! Lifecycle per network: absent → resolving → connecting → connected →
//! absent. A connection that reports `Disconnected` leaves the map at once
//! but is only shut down by [`NetworkRegistry::reap`], which the session
//! runs after the command that caused the disconnect has finished.

use std::collections::HashMap;
use std::sync::Arc;

use relay_core::{BufferInfo, NetworkId};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionEvents, ConnectionFactory, ConnectionSpec, NetworkConnection};
use crate::context::SessionContext;
use crate::errors::{Result, SessionError};
use crate::events::SessionEvent;
use crate::session::SessionCommand;
use crate::snapshot::ConnectedNetwork;

/// State of one registered connection.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStateReport {
    /// Network id.
    pub network: NetworkId,
    /// Network name.
    pub name: String,
    /// Whether the connection is up.
    pub connected: bool,
    /// Connection-defined state.
    pub state: Value,
}

struct Registered {
    handle: Arc<dyn NetworkConnection>,
    generation: u64,
}

/// Owns every live connection of a session.
///
/// Each created connection gets a fresh generation number, carried by its
/// event sink.
pub struct NetworkRegistry {
    ctx: Arc<SessionContext>,
    factory: Arc<dyn ConnectionFactory>,
    inbox: mpsc::UnboundedSender<SessionCommand>,
    handles: HashMap<NetworkId, Registered>,
    next_generation: u64,
    pending_teardown: Vec<Arc<dyn NetworkConnection>>,
}

impl NetworkRegistry {
    pub(crate) fn new(
        ctx: Arc<SessionContext>,
        factory: Arc<dyn ConnectionFactory>,
        inbox: mpsc::UnboundedSender<SessionCommand>,
    ) -> Self {
        Self {
            ctx,
            factory,
            inbox,
            handles: HashMap::new(),
            next_generation: 0,
            pending_teardown: Vec::new(),
        }
    }

    /// Resolve `name`, create its connection if none exists, and ask it to
    /// connect.
    ///
    /// Connecting an already registered network reuses its connection;
    /// `previous_state` only applies when a connection is created. Every
    /// successful call broadcasts `ConnectRequested`.
    pub fn connect_to_network(&mut self, name: &str, previous_state: Option<Value>) -> Result<NetworkId> {
        let user = self.ctx.user;
        let network = match self.ctx.storage.resolve_network_id(user, name)? {
            Some(id) if id.is_valid() => id,
            _ => {
                warn!(user = %user, name, "network name did not resolve, not connecting");
                return Err(SessionError::NetworkUnresolved {
                    name: name.to_owned(),
                });
            }
        };

        let handle = if let Some(existing) = self.handles.get(&network) {
            if previous_state.is_some() {
                debug!(network = %network, name, "connection already registered, recorded state ignored");
            } else {
                debug!(network = %network, name, "reusing existing connection");
            }
            Arc::clone(&existing.handle)
        } else {
            let spec = ConnectionSpec {
                user,
                network,
                name: name.to_owned(),
                previous_state,
            };
            let generation = self.next_generation;
            self.next_generation += 1;
            let events = ConnectionEvents::new(network, generation, self.inbox.clone());
            let handle = self.factory.create(spec, events);
            let registered = Registered {
                handle: Arc::clone(&handle),
                generation,
            };
            let _ = self.handles.insert(network, registered);
            info!(user = %user, network = %network, name, generation, "connection created");
            handle.start();
            handle
        };

        handle.connect(name);
        self.ctx.emit(SessionEvent::ConnectRequested {
            network,
            name: name.to_owned(),
        });
        Ok(network)
    }

    /// Ask the connection of `name` to disconnect.
    pub fn disconnect_from_network(&mut self, name: &str) -> Result<NetworkId> {
        let network = self
            .ctx
            .storage
            .resolve_network_id(self.ctx.user, name)?
            .ok_or_else(|| SessionError::NetworkUnresolved {
                name: name.to_owned(),
            })?;
        let registered = self
            .handles
            .get(&network)
            .ok_or(SessionError::NotConnected(network))?;
        registered.handle.disconnect(name);
        Ok(network)
    }

    /// Connection of `network` came up: make sure its status buffer exists.
    pub fn server_connected(&mut self, network: NetworkId) -> Result<()> {
        if !self.handles.contains_key(&network) {
            return Err(self.invariant(network, "connect reported for unregistered network"));
        }
        let lookup = self.ctx.storage.get_or_create_buffer(self.ctx.user, network, "")?;
        if lookup.created {
            self.ctx.emit(SessionEvent::BufferUpdated(lookup.buffer));
        }
        info!(user = %self.ctx.user, network = %network, "network connected");
        self.ctx.emit(SessionEvent::NetworkConnected(network));
        Ok(())
    }

    /// Connection of `network` went down: unregister it and queue teardown.
    pub fn server_disconnected(&mut self, network: NetworkId) -> Result<()> {
        let Some(registered) = self.handles.remove(&network) else {
            return Err(self.invariant(network, "disconnect reported for unregistered network"));
        };
        info!(user = %self.ctx.user, network = %network, "network disconnected");
        self.ctx.emit(SessionEvent::NetworkDisconnected(network));
        self.pending_teardown.push(registered.handle);
        Ok(())
    }

    /// Forward user input to the connection owning `buffer`.
    pub fn send_input(&self, buffer: &BufferInfo, text: &str) -> Result<()> {
        let registered = self
            .handles
            .get(&buffer.network_id)
            .ok_or(SessionError::NotConnected(buffer.network_id))?;
        registered.handle.submit_input(buffer.network_id, &buffer.name, text);
        Ok(())
    }

    /// Report and broadcast the state of every registered connection.
    pub fn network_states(&self) -> Vec<NetworkStateReport> {
        let reports: Vec<_> = self
            .sorted()
            .into_iter()
            .map(|handle| NetworkStateReport {
                network: handle.network_id(),
                name: handle.network_name().to_owned(),
                connected: handle.is_connected(),
                state: handle.state(),
            })
            .collect();
        for report in &reports {
            self.ctx.emit(SessionEvent::NetworkState {
                network: report.network,
                name: report.name.clone(),
                state: report.state.clone(),
            });
        }
        reports
    }

    /// `(name, state)` of every connection that is currently up.
    pub fn connected_networks(&self) -> Vec<ConnectedNetwork> {
        self.sorted()
            .into_iter()
            .filter(|handle| handle.is_connected())
            .map(|handle| ConnectedNetwork {
                network: handle.network_name().to_owned(),
                state: handle.state(),
            })
            .collect()
    }

    /// Registered network ids in ascending order.
    pub fn network_ids(&self) -> Vec<NetworkId> {
        let mut ids: Vec<_> = self.handles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Connection registered for `network`.
    pub fn get(&self, network: NetworkId) -> Option<&Arc<dyn NetworkConnection>> {
        self.handles.get(&network).map(|registered| &registered.handle)
    }

    /// Generation of the connection registered for `network`.
    pub fn generation(&self, network: NetworkId) -> Option<u64> {
        self.handles.get(&network).map(|registered| registered.generation)
    }

    /// Whether `network` has a registered connection.
    pub fn contains(&self, network: NetworkId) -> bool {
        self.handles.contains_key(&network)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Connections waiting for teardown.
    pub fn pending_teardown(&self) -> usize {
        self.pending_teardown.len()
    }

    /// Shut down and drop every connection queued for teardown.
    pub fn reap(&mut self) -> usize {
        let count = self.pending_teardown.len();
        for handle in self.pending_teardown.drain(..) {
            debug!(network = %handle.network_id(), "tearing down connection");
            handle.shutdown();
        }
        count
    }

    /// Unregister and tear down every connection.
    pub fn shutdown_all(&mut self) -> usize {
        self.pending_teardown
            .extend(self.handles.drain().map(|(_, registered)| registered.handle));
        self.reap()
    }

    fn sorted(&self) -> Vec<&Arc<dyn NetworkConnection>> {
        let mut handles: Vec<_> = self.handles.values().map(|registered| &registered.handle).collect();
        handles.sort_by_key(|handle| handle.network_id());
        handles
    }

    fn invariant(&self, network: NetworkId, detail: &str) -> SessionError {
        SessionError::Invariant {
            user: self.ctx.user,
            network,
            detail: detail.to_owned(),
        }
    }
}
