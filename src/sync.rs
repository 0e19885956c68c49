//! Sync coordinator: drains the outbox against the network when a
//! connectivity-restored trigger fires.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::http::Request;
use crate::net::NetworkClient;
use crate::outbox::{OutboxItem, OutboxKind, OutboxStore};

/// Replay endpoints, one fixed path per outbox kind.
#[derive(Debug, Clone)]
pub struct ReplayEndpoints {
  pub orders: String,
  pub waste_reports: String,
}

/// Outcome of one drain pass, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
  pub attempted: usize,
  pub replayed: usize,
  pub remaining: usize,
}

/// Replays queued writes and removes the ones the backend confirmed.
///
/// Cloneable so overlapping triggers can drain concurrently; safety comes
/// from the outbox's idempotent removal, not from serializing drains.
#[derive(Clone)]
pub struct SyncCoordinator {
  outbox: Arc<dyn OutboxStore>,
  network: Arc<dyn NetworkClient>,
  endpoints: ReplayEndpoints,
}

impl SyncCoordinator {
  pub fn new(
    outbox: Arc<dyn OutboxStore>,
    network: Arc<dyn NetworkClient>,
    endpoints: ReplayEndpoints,
  ) -> Self {
    Self {
      outbox,
      network,
      endpoints,
    }
  }

  fn endpoint(&self, kind: OutboxKind) -> &str {
    match kind {
      OutboxKind::Orders => &self.endpoints.orders,
      OutboxKind::WasteReports => &self.endpoints.waste_reports,
    }
  }

  /// One drain pass over a snapshot of the kind's queue.
  ///
  /// Items enqueued during the drain are left for the next trigger. Each
  /// item is replayed sequentially; a failure leaves that item queued and
  /// never aborts the batch. No backoff, no retry limit: an item stays
  /// queued until a future trigger succeeds or it is cleared manually.
  pub async fn drain(&self, kind: OutboxKind) -> Result<DrainReport> {
    let snapshot = self.outbox.list_all(kind)?;
    debug!(tag = kind.sync_tag(), items = snapshot.len(), "drain started");

    let mut replayed = 0;
    for item in &snapshot {
      match self.replay(item).await {
        Ok(()) => {
          if let Err(e) = self.outbox.remove(kind, &item.id) {
            warn!(id = %item.id, error = %e, "replayed but failed to dequeue");
          } else {
            replayed += 1;
          }
        }
        Err(e) => {
          warn!(id = %item.id, tag = kind.sync_tag(), error = %e, "replay failed, item stays queued");
        }
      }
    }

    let report = DrainReport {
      attempted: snapshot.len(),
      replayed,
      remaining: snapshot.len() - replayed,
    };
    info!(tag = kind.sync_tag(), ?report, "drain finished");
    Ok(report)
  }

  /// Replay one deferred write with the token captured at enqueue time.
  async fn replay(&self, item: &OutboxItem) -> Result<()> {
    let request =
      Request::post_json(self.endpoint(item.kind), &item.payload).with_bearer(&item.token);

    let response = self.network.fetch(&request).await?;
    if response.is_ok() {
      Ok(())
    } else {
      Err(eyre!("Replay endpoint returned status {}", response.status))
    }
  }
}
