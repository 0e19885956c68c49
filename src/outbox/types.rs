use chrono::{DateTime, Utc};

/// The two deferred-write kinds, each with its own storage collection, sync
/// tag and replay endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxKind {
  Orders,
  WasteReports,
}

impl OutboxKind {
  /// Storage table backing this kind.
  pub fn table(&self) -> &'static str {
    match self {
      OutboxKind::Orders => "outbox_orders",
      OutboxKind::WasteReports => "outbox_waste_reports",
    }
  }

  /// Tag of the sync trigger that drains this kind.
  pub fn sync_tag(&self) -> &'static str {
    match self {
      OutboxKind::Orders => "sync-orders",
      OutboxKind::WasteReports => "sync-waste-reports",
    }
  }

  pub fn from_sync_tag(tag: &str) -> Option<Self> {
    match tag {
      "sync-orders" => Some(OutboxKind::Orders),
      "sync-waste-reports" => Some(OutboxKind::WasteReports),
      _ => None,
    }
  }
}

/// One deferred write, owned exclusively by the outbox store.
///
/// The auth token is captured at enqueue time because the replay may happen
/// long after the page that created the write is gone.
#[derive(Debug, Clone)]
pub struct OutboxItem {
  pub id: String,
  pub kind: OutboxKind,
  /// Opaque JSON body replayed verbatim.
  pub payload: serde_json::Value,
  pub token: String,
  pub enqueued_at: DateTime<Utc>,
}
