mod cache;
mod clients;
mod config;
mod db;
mod fetch;
mod http;
mod net;
mod outbox;
mod push;
mod signal;
mod sync;
mod worker;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cache::{CacheManager, SqliteCacheStore};
use clients::{ClientRegistry, LogClients};
use config::Config;
use db::Database;
use fetch::FetchInterceptor;
use net::{Connectivity, NetworkClient, ReqwestClient};
use outbox::{OutboxKind, SqliteOutbox};
use push::{LogNotifier, Notifier};
use signal::SignalHub;
use sync::SyncCoordinator;
use worker::{Worker, WorkerEvent, WorkerHandle};

#[derive(Parser, Debug)]
#[command(name = "marketsync")]
#[command(about = "Offline sync worker for the marketplace web client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/marketsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Path to the durable worker database (default: platform data dir)
  #[arg(long)]
  db: Option<PathBuf>,
}

fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("marketsync")
    .join("logs");

  let appender = tracing_appender::rolling::daily(log_dir, "marketsync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_tracing()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let database = Arc::new(match &args.db {
    Some(path) => Database::open(path)?,
    None => Database::open_default()?,
  });
  let cache_store = Arc::new(SqliteCacheStore::new(Arc::clone(&database)));
  let outbox = Arc::new(SqliteOutbox::new(Arc::clone(&database)));
  let network: Arc<dyn NetworkClient> = Arc::new(ReqwestClient::new(&config.origin)?);
  let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
  let client_registry: Arc<dyn ClientRegistry> = Arc::new(LogClients);

  let cache = CacheManager::new(
    cache_store.clone(),
    Arc::clone(&network),
    config.cache_version.clone(),
    config.static_assets.clone(),
  );
  let interceptor = FetchInterceptor::new(
    cache_store,
    Arc::clone(&network),
    config.cache_version.clone(),
    config.api_prefix.clone(),
  );
  let coordinator = SyncCoordinator::new(outbox, Arc::clone(&network), config.replay_endpoints());

  let (worker, handle) = Worker::new(cache, interceptor, coordinator, notifier, client_registry);

  // Connectivity-restored signals become sync triggers for both kinds.
  let hub: SignalHub<Connectivity> = SignalHub::new();
  spawn_sync_bridge(hub.subscribe(), handle.clone());
  net::spawn_probe(
    network,
    config.connectivity.probe_path.clone(),
    Duration::from_secs(config.connectivity.probe_interval_secs),
    hub,
  );

  handle.send(WorkerEvent::Install)?;

  worker.run().await
}

/// Map every connectivity-restored signal to one sync trigger per kind.
fn spawn_sync_bridge(
  mut subscription: signal::Subscription<Connectivity>,
  handle: WorkerHandle,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    while let Some(state) = subscription.recv().await {
      if state != Connectivity::Online {
        continue;
      }
      for kind in [OutboxKind::Orders, OutboxKind::WasteReports] {
        if handle
          .send(WorkerEvent::Sync(kind.sync_tag().to_string()))
          .is_err()
        {
          return;
        }
      }
    }
  })
}
