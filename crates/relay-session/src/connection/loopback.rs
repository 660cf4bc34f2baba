//! In-process loopback network.
//!
//! Speaks no wire protocol. Connecting flips a flag, and user input comes
//! back as self-echo lines, so clients can use every session feature
//! against a daemon that has no real networks configured. A few commands
//! are understood: `/join #chan`, `/part #chan`, `/nick name`, `/me text`.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::{MessageFlags, MessageType, NetworkId};
use serde_json::{Value, json};
use tracing::debug;

use super::{
    ConnectionEvent, ConnectionEvents, ConnectionFactory, ConnectionSpec, InboundMessage,
    NetworkConnection,
};

#[derive(Debug, Default)]
struct LoopbackState {
    started: bool,
    connected: bool,
    nick: String,
    channels: BTreeSet<String>,
}

/// A connection that echoes input back to the session.
pub struct LoopbackConnection {
    network: NetworkId,
    name: String,
    events: ConnectionEvents,
    state: Mutex<LoopbackState>,
}

impl LoopbackConnection {
    /// Build from a spec, restoring nick and channels from `previous_state`.
    pub fn new(spec: ConnectionSpec, events: ConnectionEvents, default_nick: &str) -> Self {
        let mut state = LoopbackState {
            nick: default_nick.to_owned(),
            ..LoopbackState::default()
        };
        if let Some(previous) = &spec.previous_state {
            if let Some(nick) = previous.get("nick").and_then(Value::as_str) {
                nick.clone_into(&mut state.nick);
            }
            if let Some(channels) = previous.get("channels").and_then(Value::as_array) {
                state.channels = channels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect();
            }
        }
        Self {
            network: spec.network,
            name: spec.name,
            events,
            state: Mutex::new(state),
        }
    }

    fn mask(nick: &str) -> String {
        format!("{nick}!relay@loopback")
    }

    fn snapshot(state: &LoopbackState) -> Value {
        json!({
            "connected": state.connected,
            "nick": state.nick,
            "channels": state.channels,
        })
    }

    fn echo(&self, msg_type: MessageType, target: &str, text: &str, nick: &str) {
        let _ = self.events.emit(ConnectionEvent::MessageReceived(InboundMessage {
            msg_type,
            target: target.to_owned(),
            text: text.to_owned(),
            sender: Self::mask(nick),
            flags: MessageFlags::SELF,
        }));
    }

    fn status(&self, text: String) {
        let _ = self.events.emit(ConnectionEvent::StatusMessage { text });
    }

    fn state_changed(&self, state: &LoopbackState) {
        let _ = self.events.emit(ConnectionEvent::StateChanged {
            state: Self::snapshot(state),
        });
    }

    fn run_command(&self, target: &str, command: &str, arg: &str) {
        let mut state = self.state.lock();
        let nick = state.nick.clone();
        match command {
            "join" if !arg.is_empty() => {
                if state.channels.insert(arg.to_owned()) {
                    self.echo(MessageType::Join, arg, "", &nick);
                    self.state_changed(&state);
                }
            }
            "part" => {
                let channel = if arg.is_empty() { target } else { arg };
                if state.channels.remove(channel) {
                    self.echo(MessageType::Part, channel, "", &nick);
                    self.state_changed(&state);
                }
            }
            "nick" if !arg.is_empty() => {
                arg.clone_into(&mut state.nick);
                self.echo(MessageType::Nick, target, arg, &nick);
                self.state_changed(&state);
            }
            "me" if !target.is_empty() => self.echo(MessageType::Action, target, arg, &nick),
            _ => self.status(format!("Unknown command: /{command}")),
        }
    }
}

impl NetworkConnection for LoopbackConnection {
    fn network_id(&self) -> NetworkId {
        self.network
    }

    fn network_name(&self) -> &str {
        &self.name
    }

    fn start(&self) {
        let mut state = self.state.lock();
        if !state.started {
            state.started = true;
            self.status(format!("Loopback network {} ready", self.name));
        }
    }

    fn connect(&self, name: &str) {
        let mut state = self.state.lock();
        if state.connected {
            debug!(network = %self.network, "loopback already connected");
            return;
        }
        state.connected = true;
        self.state_changed(&state);
        let _ = self.events.emit(ConnectionEvent::Connected);
        self.status(format!("Connected to {name} as {}", state.nick));
    }

    fn disconnect(&self, name: &str) {
        let mut state = self.state.lock();
        if !state.connected {
            return;
        }
        state.connected = false;
        self.status(format!("Disconnected from {name}"));
        self.state_changed(&state);
        let _ = self.events.emit(ConnectionEvent::Disconnected);
    }

    fn submit_input(&self, network: NetworkId, target: &str, text: &str) {
        if network != self.network {
            debug!(network = %network, own = %self.network, "input for another network ignored");
            return;
        }
        if !self.is_connected() {
            self.status("Not connected".to_owned());
            return;
        }
        if let Some(command) = text.strip_prefix('/') {
            let (command, arg) = command.split_once(' ').unwrap_or((command, ""));
            self.run_command(target, &command.to_ascii_lowercase(), arg.trim());
            return;
        }
        if target.is_empty() {
            self.status(format!("Cannot send to the status buffer: {text}"));
            return;
        }
        let nick = self.state.lock().nick.clone();
        self.echo(MessageType::Plain, target, text, &nick);
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn state(&self) -> Value {
        Self::snapshot(&self.state.lock())
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        state.connected = false;
        debug!(network = %self.network, "loopback connection released");
    }
}

/// Factory producing [`LoopbackConnection`]s.
pub struct LoopbackFactory {
    nick: String,
}

impl LoopbackFactory {
    /// Factory whose connections start with `nick`.
    pub fn new(nick: impl Into<String>) -> Self {
        Self { nick: nick.into() }
    }
}

impl ConnectionFactory for LoopbackFactory {
    fn create(&self, spec: ConnectionSpec, events: ConnectionEvents) -> Arc<dyn NetworkConnection> {
        Arc::new(LoopbackConnection::new(spec, events, &self.nick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionCommand;
    use relay_core::UserId;
    use tokio::sync::mpsc;

    fn setup(previous: Option<Value>) -> (LoopbackConnection, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let spec = ConnectionSpec {
            user: UserId::new(1),
            network: NetworkId::new(3),
            name: "loop".into(),
            previous_state: previous,
        };
        let conn = LoopbackConnection::new(spec, ConnectionEvents::new(NetworkId::new(3), 0, tx), "relay");
        (conn, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionCommand>) -> Vec<ConnectionEvent> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            if let SessionCommand::Connection { network, event, .. } = cmd {
                assert_eq!(network, NetworkId::new(3));
                out.push(event);
            }
        }
        out
    }

    #[test]
    fn connect_reports_connected_once() {
        let (conn, mut rx) = setup(None);
        conn.start();
        conn.connect("loop");
        conn.connect("loop");
        let events = drain(&mut rx);
        let connected = events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::Connected))
            .count();
        assert_eq!(connected, 1);
        assert!(conn.is_connected());
    }

    #[test]
    fn plain_input_echoes_with_self_flag() {
        let (conn, mut rx) = setup(None);
        conn.connect("loop");
        let _ = drain(&mut rx);
        conn.submit_input(NetworkId::new(3), "#rust", "hello");
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![ConnectionEvent::MessageReceived(InboundMessage {
                msg_type: MessageType::Plain,
                target: "#rust".into(),
                text: "hello".into(),
                sender: "relay!relay@loopback".into(),
                flags: MessageFlags::SELF,
            })]
        );
    }

    #[test]
    fn join_updates_state() {
        let (conn, mut rx) = setup(None);
        conn.connect("loop");
        conn.submit_input(NetworkId::new(3), "", "/join #rust");
        assert_eq!(conn.state()["channels"], json!(["#rust"]));
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            ConnectionEvent::MessageReceived(m) if m.msg_type == MessageType::Join
        )));
    }

    #[test]
    fn input_while_disconnected_is_status_only() {
        let (conn, mut rx) = setup(None);
        conn.submit_input(NetworkId::new(3), "#rust", "hello");
        assert_eq!(
            drain(&mut rx),
            vec![ConnectionEvent::StatusMessage {
                text: "Not connected".into()
            }]
        );
    }

    #[test]
    fn previous_state_restores_nick_and_channels() {
        let (conn, _rx) = setup(Some(json!({"nick": "ghost", "channels": ["#a", "#b"]})));
        let state = conn.state();
        assert_eq!(state["nick"], "ghost");
        assert_eq!(state["channels"], json!(["#a", "#b"]));
        assert_eq!(state["connected"], false);
    }

    #[test]
    fn disconnect_emits_disconnected() {
        let (conn, mut rx) = setup(None);
        conn.connect("loop");
        let _ = drain(&mut rx);
        conn.disconnect("loop");
        assert!(drain(&mut rx).contains(&ConnectionEvent::Disconnected));
        assert!(!conn.is_connected());
    }
}
