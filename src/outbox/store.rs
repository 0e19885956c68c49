//! Outbox storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::types::{OutboxItem, OutboxKind};
use crate::db::Database;

/// Trait for durable keyed outbox backends.
///
/// Records are keyed by id for O(1) insert and delete, and must survive a
/// full process restart: the trigger to replay may only fire after the user
/// reopens the app.
pub trait OutboxStore: Send + Sync {
  /// Persist one deferred write and return its generated id.
  fn enqueue(&self, kind: OutboxKind, payload: serde_json::Value, token: &str) -> Result<String>;

  /// Every stored item of the kind, in storage's native order. Order is
  /// best-effort: each item is an independent write.
  fn list_all(&self, kind: OutboxKind) -> Result<Vec<OutboxItem>>;

  /// Delete one entry. Removing a missing id is a no-op, not an error, so
  /// overlapping drains can race on the same item safely.
  fn remove(&self, kind: OutboxKind, id: &str) -> Result<()>;
}

/// SQLite-backed outbox, one table per kind.
pub struct SqliteOutbox {
  db: Arc<Database>,
}

impl SqliteOutbox {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl OutboxStore for SqliteOutbox {
  fn enqueue(&self, kind: OutboxKind, payload: serde_json::Value, token: &str) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let body = serde_json::to_vec(&payload)
      .map_err(|e| eyre!("Failed to serialize outbox payload: {}", e))?;

    let conn = self.db.conn()?;
    conn
      .execute(
        &format!(
          "INSERT INTO {} (id, payload, token, enqueued_at) VALUES (?, ?, ?, datetime('now'))",
          kind.table()
        ),
        params![id, body, token],
      )
      .map_err(|e| eyre!("Failed to enqueue outbox item: {}", e))?;

    Ok(id)
  }

  fn list_all(&self, kind: OutboxKind) -> Result<Vec<OutboxItem>> {
    let conn = self.db.conn()?;

    let mut stmt = conn
      .prepare(&format!(
        "SELECT id, payload, token, enqueued_at FROM {}",
        kind.table()
      ))
      .map_err(|e| eyre!("Failed to prepare outbox query: {}", e))?;

    let rows: Vec<(String, Vec<u8>, String, String)> = stmt
      .query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .map_err(|e| eyre!("Failed to query outbox: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    let mut items = Vec::with_capacity(rows.len());
    for (id, body, token, enqueued_at) in rows {
      // A corrupt row must not block its healthy siblings; it stays in the
      // table until cleared manually
      let payload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
          warn!(%id, table = kind.table(), error = %e, "skipping malformed outbox payload");
          continue;
        }
      };
      let enqueued_at = match parse_datetime(&enqueued_at) {
        Ok(enqueued_at) => enqueued_at,
        Err(e) => {
          warn!(%id, table = kind.table(), error = %e, "skipping outbox row with bad timestamp");
          continue;
        }
      };
      items.push(OutboxItem {
        id,
        kind,
        payload,
        token,
        enqueued_at,
      });
    }

    Ok(items)
  }

  fn remove(&self, kind: OutboxKind, id: &str) -> Result<()> {
    let conn = self.db.conn()?;

    // Zero rows affected is fine: the item may already be gone
    conn
      .execute(
        &format!("DELETE FROM {} WHERE id = ?", kind.table()),
        params![id],
      )
      .map_err(|e| eyre!("Failed to remove outbox item {}: {}", id, e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
