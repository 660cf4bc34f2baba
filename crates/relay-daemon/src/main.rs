//! # relay
//!
//! Relay daemon binary. Loads settings, opens the database, starts the
//! user's session and serves it over HTTP/WebSocket until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::UserId;
use relay_core::logging::{LogFormat, init_subscriber};
use relay_rpc::{MethodRegistry, RpcContext};
use relay_server::{RelayServer, ServerConfig};
use relay_session::{CoreSession, LoopbackFactory, SessionConfig};
use relay_settings::RelaySettings;
use relay_store::{ConnectionConfig, SqliteStorage, Storage};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long the session task gets to persist its snapshot on exit.
const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay daemon.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Multi-network chat relay daemon")]
struct Cli {
    /// Settings file (defaults to `~/.relay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Log filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Skip reconnecting the networks stored at last shutdown.
    #[arg(long)]
    no_restore: bool,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.db_path {
            settings.storage.db_path = path.to_string_lossy().into_owned();
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.no_restore {
            settings.session.restore_on_start = false;
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Open the database and register the configured networks.
fn open_storage(settings: &RelaySettings, home: &Path) -> Result<SqliteStorage> {
    let db_path = relay_settings::resolve_db_path(settings, home);
    ensure_parent_dir(&db_path)?;
    let config = ConnectionConfig {
        pool_size: settings.storage.pool_size,
        busy_timeout_ms: settings.storage.busy_timeout_ms,
    };
    let storage = SqliteStorage::open_file(&db_path.to_string_lossy(), &config)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    let user = UserId::new(settings.session.user_id);
    for name in &settings.session.networks {
        let id = storage
            .ensure_network(user, name)
            .with_context(|| format!("Failed to register network '{name}'"))?;
        info!(network = %name, %id, "network registered");
    }
    info!(path = %db_path.display(), "database ready");
    Ok(storage)
}

fn session_config(settings: &RelaySettings) -> SessionConfig {
    SessionConfig {
        user: UserId::new(settings.session.user_id),
        backlog_chunk_size: settings.session.backlog_chunk_size,
        event_capacity: settings.session.event_capacity,
        persist_on_shutdown: true,
    }
}

/// Build the session and, if enabled, reconnect the stored networks.
fn build_session(settings: &RelaySettings, storage: SqliteStorage) -> Result<CoreSession> {
    let storage = Arc::new(storage);
    let mut session = CoreSession::new(
        session_config(settings),
        storage.clone(),
        storage,
        Arc::new(LoopbackFactory::new("relay")),
    )
    .context("Failed to create session")?;

    if settings.session.restore_on_start {
        match session.restore_persisted() {
            Ok(report) => {
                for (network, reason) in &report.failed {
                    warn!(%network, %reason, "network not restored");
                }
                info!(restored = report.restored.len(), "session restored");
            }
            Err(e) => warn!(error = %e, "session restore failed, starting empty"),
        }
    }
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match args.config {
        Some(ref path) => relay_settings::load_settings_from_path(path),
        None => relay_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    args.apply(&mut settings);

    let format = settings.logging.format.parse::<LogFormat>();
    init_subscriber(&settings.logging.level, format.clone().unwrap_or_default());
    if let Err(e) = format {
        warn!(error = %e, "falling back to compact log format");
    }

    let home = relay_settings::relay_home();
    let storage = open_storage(&settings, &home)?;
    let session = build_session(&settings, storage)?;

    let session_cancel = CancellationToken::new();
    let (handle, session_task) = session.spawn(session_cancel.clone());

    let mut registry = MethodRegistry::new();
    relay_rpc::handlers::register_all(&mut registry);
    let server = RelayServer::new(
        ServerConfig::from(&settings.server),
        registry,
        RpcContext::new(handle),
    );
    let bridge = server.spawn_event_bridge();
    let (addr, serve) = server.listen().await.context("Failed to bind server")?;
    info!(%addr, user = settings.session.user_id, "relay daemon started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutdown requested");

    let aborted = server.shutdown().graceful_shutdown(vec![serve, bridge], None).await;
    info!(aborted, "server stopped");

    session_cancel.cancel();
    if tokio::time::timeout(SESSION_STOP_TIMEOUT, session_task).await.is_err() {
        warn!("session did not stop in time, snapshot may be stale");
    }
    info!("relay daemon stopped");
    Ok(())
}
