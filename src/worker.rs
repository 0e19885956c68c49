//! The background agent: an event-driven loop dispatching lifecycle,
//! fetch, sync and push signals to the cooperating components.
//!
//! Everything the worker touches is an explicitly constructed collaborator
//! passed in at build time; there is no module-level state.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::clients::ClientRegistry;
use crate::fetch::FetchInterceptor;
use crate::http::{Request, Response};
use crate::outbox::OutboxKind;
use crate::push::{handle_notification_click, notification_for, Notifier};
use crate::sync::SyncCoordinator;

/// Signals dispatched to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
  /// Lifecycle: populate the current cache version.
  Install,
  /// Lifecycle: purge stale cache versions and claim clients.
  Activate,
  /// An intercepted page request; the response goes back on the channel.
  Fetch(Request, oneshot::Sender<Result<Response>>),
  /// A sync trigger by tag (`sync-orders` / `sync-waste-reports`).
  Sync(String),
  /// A push event with its raw data, if any.
  Push(Option<Vec<u8>>),
  /// A click on a previously shown notification.
  NotificationClick(String),
}

/// Sending half handed to signal producers.
#[derive(Clone)]
pub struct WorkerHandle {
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
  pub fn send(&self, event: WorkerEvent) -> Result<()> {
    self
      .tx
      .send(event)
      .map_err(|_| eyre!("Worker event loop has shut down"))
  }

  /// Dispatch a fetch and await its response.
  pub async fn fetch(&self, request: Request) -> Result<Response> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self.send(WorkerEvent::Fetch(request, reply_tx))?;
    reply_rx
      .await
      .map_err(|_| eyre!("Worker dropped the fetch"))?
  }
}

pub struct Worker {
  cache: CacheManager,
  interceptor: FetchInterceptor,
  sync: SyncCoordinator,
  notifier: Arc<dyn Notifier>,
  clients: Arc<dyn ClientRegistry>,
  /// Weak self-sender for chained lifecycle events, so the loop still stops
  /// once every external handle is dropped.
  self_tx: mpsc::WeakUnboundedSender<WorkerEvent>,
  rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl Worker {
  pub fn new(
    cache: CacheManager,
    interceptor: FetchInterceptor,
    sync: SyncCoordinator,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn ClientRegistry>,
  ) -> (Self, WorkerHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let self_tx = tx.downgrade();
    let handle = WorkerHandle { tx };

    let worker = Self {
      cache,
      interceptor,
      sync,
      notifier,
      clients,
      self_tx,
      rx,
    };

    (worker, handle)
  }

  /// Run until every handle is dropped.
  pub async fn run(mut self) -> Result<()> {
    while let Some(event) = self.rx.recv().await {
      self.handle_event(event).await;
    }
    info!("worker event loop stopped");
    Ok(())
  }

  async fn handle_event(&self, event: WorkerEvent) {
    match event {
      WorkerEvent::Install => {
        match self.cache.install().await {
          Ok(()) => {
            // Skip the waiting phase: a successful install activates
            // immediately.
            match self.self_tx.upgrade() {
              Some(tx) => {
                let _ = tx.send(WorkerEvent::Activate);
              }
              None => warn!("install finished after shutdown"),
            }
          }
          // Fatal to this install attempt only; a later install signal may
          // retry with the same version.
          Err(e) => warn!(error = %e, "install failed"),
        }
      }

      WorkerEvent::Activate => {
        if let Err(e) = self.cache.activate(self.clients.as_ref()).await {
          warn!(error = %e, "activate failed");
        }
      }

      WorkerEvent::Fetch(request, reply) => {
        // Served on its own task so a slow network never blocks the loop
        let interceptor = self.interceptor.clone();
        tokio::spawn(async move {
          let response = interceptor.handle(&request).await;
          // The requester may have gone away; that is not our problem
          let _ = reply.send(response);
        });
      }

      WorkerEvent::Sync(tag) => match OutboxKind::from_sync_tag(&tag) {
        Some(kind) => {
          // Drains run concurrently on purpose: overlapping triggers are
          // not serialized, idempotent removal keeps them safe.
          let sync = self.sync.clone();
          tokio::spawn(async move {
            if let Err(e) = sync.drain(kind).await {
              warn!(%tag, error = %e, "drain failed");
            }
          });
        }
        None => debug!(%tag, "ignoring unknown sync tag"),
      },

      WorkerEvent::Push(data) => {
        // Malformed or absent payloads are ignored entirely
        if let Some(notification) = notification_for(data.as_deref()) {
          if let Err(e) = self.notifier.show(&notification).await {
            warn!(error = %e, "failed to show notification");
          }
        }
      }

      WorkerEvent::NotificationClick(url) => {
        if let Err(e) = handle_notification_click(self.clients.as_ref(), &url).await {
          warn!(%url, error = %e, "notification click handling failed");
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheStore, SqliteCacheStore};
  use crate::clients::testing::MockClients;
  use crate::db::Database;
  use crate::http::Method;
  use crate::net::testing::MockNetwork;
  use crate::outbox::{OutboxStore, SqliteOutbox};
  use crate::push::{LogNotifier, Notification};
  use crate::sync::ReplayEndpoints;
  use std::sync::Mutex;

  fn build_worker(
    network: Arc<MockNetwork>,
    notifier: Arc<dyn Notifier>,
  ) -> (Worker, WorkerHandle, Arc<SqliteCacheStore>, Arc<SqliteOutbox>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = Arc::new(SqliteCacheStore::new(db.clone()));
    let outbox = Arc::new(SqliteOutbox::new(db));

    let cache = CacheManager::new(
      store.clone(),
      network.clone(),
      "v1",
      vec!["/".to_string(), "/js/app.js".to_string()],
    );
    let interceptor = FetchInterceptor::new(store.clone(), network.clone(), "v1", "/api/");
    let sync = SyncCoordinator::new(
      outbox.clone(),
      network,
      ReplayEndpoints {
        orders: "/api/orders/".to_string(),
        waste_reports: "/api/waste/".to_string(),
      },
    );

    let (worker, handle) = Worker::new(
      cache,
      interceptor,
      sync,
      notifier,
      Arc::new(MockClients::new(vec![])),
    );
    (worker, handle, store, outbox)
  }

  /// A fetch round-trip proves every event sent before it has been
  /// dispatched, since the loop handles events in order. The path is under
  /// the API prefix so the round-trip never touches the cache.
  async fn barrier(handle: &WorkerHandle) {
    let _ = handle.fetch(Request::get("/api/barrier")).await;
  }

  /// Poll a condition with a bounded retry, for work the loop hands off to
  /// a spawned task.
  async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
      if condition() {
        return;
      }
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not met within the retry budget");
  }

  #[tokio::test]
  async fn test_install_populates_then_activates() {
    let network = Arc::new(MockNetwork::always(Response::new(200).with_body("ok")));
    let (worker, handle, store, _) = build_worker(network, Arc::new(LogNotifier));

    handle.send(WorkerEvent::Install).unwrap();
    let runner = tokio::spawn(worker.run());

    barrier(&handle).await;
    assert_eq!(store.entry_count("v1").unwrap(), 2);

    drop(handle);
    runner.await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn test_fetch_event_round_trip() {
    let network = Arc::new(MockNetwork::always(Response::new(200).with_body("asset")));
    let (worker, handle, _, _) = build_worker(network, Arc::new(LogNotifier));
    let runner = tokio::spawn(worker.run());

    let response = handle.fetch(Request::get("/css/styles.css")).await.unwrap();
    assert_eq!(response.body, b"asset");

    drop(handle);
    runner.await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn test_sync_event_drains_matching_kind() {
    let network = Arc::new(MockNetwork::always(Response::new(200)));
    let (worker, handle, _, outbox) = build_worker(network, Arc::new(LogNotifier));
    outbox
      .enqueue(OutboxKind::Orders, serde_json::json!({"product": 1}), "t")
      .unwrap();

    let runner = tokio::spawn(worker.run());
    handle
      .send(WorkerEvent::Sync("sync-orders".to_string()))
      .unwrap();

    // The drain runs on its own task, so poll for its effect
    wait_until(|| outbox.list_all(OutboxKind::Orders).unwrap().is_empty()).await;

    drop(handle);
    runner.await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn test_unknown_sync_tag_is_ignored() {
    let network = Arc::new(MockNetwork::unreachable());
    let (worker, handle, _, outbox) = build_worker(network, Arc::new(LogNotifier));
    outbox
      .enqueue(OutboxKind::Orders, serde_json::json!({}), "t")
      .unwrap();

    let runner = tokio::spawn(worker.run());
    handle
      .send(WorkerEvent::Sync("sync-unknown".to_string()))
      .unwrap();

    barrier(&handle).await;
    assert_eq!(outbox.list_all(OutboxKind::Orders).unwrap().len(), 1);

    drop(handle);
    runner.await.unwrap().unwrap();
  }

  struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
  }

  #[async_trait::async_trait]
  impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
      self.shown.lock().unwrap().push(notification.clone());
      Ok(())
    }
  }

  #[tokio::test]
  async fn test_push_event_shows_notification_and_ignores_garbage() {
    let network = Arc::new(MockNetwork::unreachable());
    let notifier = Arc::new(RecordingNotifier {
      shown: Mutex::new(Vec::new()),
    });
    let (worker, handle, _, _) = build_worker(network, notifier.clone());
    let runner = tokio::spawn(worker.run());

    handle
      .send(WorkerEvent::Push(Some(
        br#"{"title": "Hello", "message": "World"}"#.to_vec(),
      )))
      .unwrap();
    handle.send(WorkerEvent::Push(Some(b"not json".to_vec()))).unwrap();
    handle.send(WorkerEvent::Push(None)).unwrap();

    barrier(&handle).await;

    let shown = notifier.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Hello");

    drop(shown);
    drop(handle);
    runner.await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn test_failed_install_leaves_cache_empty_and_loop_alive() {
    let network = Arc::new(MockNetwork::new(|request| {
      if request.url == "/js/app.js" {
        Err("offline".to_string())
      } else {
        Ok(Response::new(200))
      }
    }));
    let (worker, handle, store, _) = build_worker(network, Arc::new(LogNotifier));
    let runner = tokio::spawn(worker.run());

    handle.send(WorkerEvent::Install).unwrap();
    barrier(&handle).await;

    assert_eq!(store.entry_count("v1").unwrap(), 0);
    // The loop survived the failed install
    assert!(store.get("v1", Method::Get, "/").unwrap().is_none());
    handle.send(WorkerEvent::Activate).unwrap();

    drop(handle);
    runner.await.unwrap().unwrap();
  }
}
