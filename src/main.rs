//! # nimbus
//!
//! Chat service binary: loads settings, wires storage and the agent, and
//! serves `/chat`.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nimbus_agent::{Agent, EchoAgent, HttpAgent};
use nimbus_core::settings::StorageKind;
use nimbus_core::Settings;
use nimbus_server::{ChatService, ServerConfig};
use nimbus_store::{Database, DocumentBackend, HistoryStore, MemoryBackend, SqliteBackend};
use nimbus_telemetry::TelemetryConfig;

/// Bounded-history chat service.
#[derive(Parser, Debug)]
#[command(name = "nimbus", about = "Chat service with bounded session history")]
struct Cli {
    /// Port to bind (0 for auto-assign). Overrides PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Path to the SQLite history database. Overrides NIMBUS_DATABASE_PATH.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Storage backend: sqlite or memory. Overrides NIMBUS_STORAGE.
    #[arg(long)]
    storage: Option<StorageKind>,
}

impl Cli {
    fn apply(self, settings: &mut Settings) {
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = self.database {
            settings.storage.database_path = path;
        }
        if let Some(kind) = self.storage {
            settings.storage.kind = kind;
        }
    }
}

fn open_backend(settings: &Settings) -> Result<Arc<dyn DocumentBackend>> {
    Ok(match settings.storage.kind {
        StorageKind::Sqlite => {
            let path = &settings.storage.database_path;
            let db = Database::open(path)
                .with_context(|| format!("Failed to open database: {}", path.display()))?;
            Arc::new(SqliteBackend::new(db))
        }
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage; history is lost on restart");
            Arc::new(MemoryBackend::new())
        }
    })
}

fn build_agent(settings: &Settings) -> Result<Arc<dyn Agent>> {
    Ok(match &settings.agent.url {
        Some(url) => {
            let timeout = Duration::from_secs(settings.agent.timeout_secs);
            let agent = HttpAgent::new(url, timeout).context("Failed to build agent client")?;
            tracing::info!(url = %agent.run_url(), timeout_secs = settings.agent.timeout_secs, "using HTTP agent");
            Arc::new(agent)
        }
        None => {
            tracing::warn!("AGENT_URL not set; replies are echoed");
            Arc::new(EchoAgent)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env().context("Invalid configuration")?;
    cli.apply(&mut settings);

    let _telemetry = nimbus_telemetry::init_telemetry(TelemetryConfig::from(&settings));

    let backend = open_backend(&settings)?;
    let history = HistoryStore::new(backend, &settings.history);
    tracing::info!(
        backend = history.backend_name(),
        collection = history.collection(),
        max_messages = settings.history.max_messages,
        max_chars = settings.history.max_chars,
        "history store ready"
    );

    let agent = build_agent(&settings)?;
    let chat = ChatService::new(settings.app_name.clone(), history, agent);

    let handle = nimbus_server::start(ServerConfig::from(&settings.server), chat)
        .await
        .context("Failed to start server")?;
    tracing::info!(port = handle.port, "nimbus ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}
