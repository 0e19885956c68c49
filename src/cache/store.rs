//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::db::Database;
use crate::http::{Method, Request, Response, ResponseKind};

/// Trait for versioned request/response cache backends.
///
/// Entries are keyed by the exact (method, URL) pair within a named cache
/// version; no normalization, no query-string stripping.
pub trait CacheStore: Send + Sync {
  /// Look up a cached response by exact request identity.
  fn get(&self, version: &str, method: Method, url: &str) -> Result<Option<Response>>;

  /// Store one response under the request's identity, overwriting any
  /// previous entry for the same identity.
  fn put(&self, version: &str, request: &Request, response: &Response) -> Result<()>;

  /// Store a whole manifest in one transaction: either every entry lands or
  /// none does.
  fn put_all(&self, version: &str, entries: &[(Request, Response)]) -> Result<()>;

  /// Names of all stored cache versions.
  fn versions(&self) -> Result<Vec<String>>;

  /// Drop every entry of one version.
  fn delete_version(&self, version: &str) -> Result<()>;

  /// Number of entries stored under one version.
  fn entry_count(&self, version: &str) -> Result<u64>;
}

/// Fixed-length storage key derived from the exact request identity.
fn storage_key(method: Method, url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(method.as_str().as_bytes());
  hasher.update(b" ");
  hasher.update(url.as_bytes());
  hex::encode(hasher.finalize())
}

/// SQLite-backed cache store.
pub struct SqliteCacheStore {
  db: Arc<Database>,
}

impl SqliteCacheStore {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  fn insert_entry(
    conn: &rusqlite::Connection,
    version: &str,
    request: &Request,
    response: &Response,
  ) -> Result<()> {
    let headers = serde_json::to_vec(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO asset_cache
           (version, key_hash, method, url, status, kind, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          version,
          storage_key(request.method, &request.url),
          request.method.as_str(),
          request.url,
          response.status,
          response.kind.as_str(),
          headers,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }
}

impl CacheStore for SqliteCacheStore {
  fn get(&self, version: &str, method: Method, url: &str) -> Result<Option<Response>> {
    let conn = self.db.conn()?;

    let mut stmt = conn
      .prepare(
        "SELECT status, kind, headers, body FROM asset_cache
         WHERE version = ? AND key_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare cache lookup: {}", e))?;

    let row: Option<(u16, String, Vec<u8>, Vec<u8>)> = stmt
      .query_row(params![version, storage_key(method, url)], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .ok();

    match row {
      Some((status, kind, headers, body)) => {
        let headers: Vec<(String, String)> = serde_json::from_slice(&headers)
          .map_err(|e| eyre!("Failed to deserialize cached headers: {}", e))?;
        Ok(Some(Response {
          status,
          kind: ResponseKind::parse(&kind),
          headers,
          body,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, version: &str, request: &Request, response: &Response) -> Result<()> {
    let conn = self.db.conn()?;
    Self::insert_entry(&conn, version, request, response)
  }

  fn put_all(&self, version: &str, entries: &[(Request, Response)]) -> Result<()> {
    let mut conn = self.db.conn()?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (request, response) in entries {
      Self::insert_entry(&tx, version, request, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit cache population: {}", e))?;

    Ok(())
  }

  fn versions(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT version FROM asset_cache")
      .map_err(|e| eyre!("Failed to prepare version query: {}", e))?;

    let versions = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to query versions: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(versions)
  }

  fn delete_version(&self, version: &str) -> Result<()> {
    let conn = self.db.conn()?;

    conn
      .execute("DELETE FROM asset_cache WHERE version = ?", params![version])
      .map_err(|e| eyre!("Failed to delete cache version {}: {}", version, e))?;

    Ok(())
  }

  fn entry_count(&self, version: &str) -> Result<u64> {
    let conn = self.db.conn()?;

    let count: u64 = conn
      .query_row(
        "SELECT COUNT(*) FROM asset_cache WHERE version = ?",
        params![version],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;

    Ok(count)
  }
}
