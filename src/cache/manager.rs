//! Install/activate lifecycle management for the versioned asset cache.

use color_eyre::{eyre::eyre, Result};
use futures::future;
use std::sync::Arc;
use tracing::info;

use super::store::CacheStore;
use crate::clients::ClientRegistry;
use crate::http::Request;
use crate::net::NetworkClient;

/// Populates the current cache version at install and purges stale versions
/// at activate.
pub struct CacheManager {
  store: Arc<dyn CacheStore>,
  network: Arc<dyn NetworkClient>,
  /// Name of the current cache generation.
  version: String,
  /// Fixed manifest of static asset URLs cached for offline page loads.
  manifest: Vec<String>,
}

impl CacheManager {
  pub fn new(
    store: Arc<dyn CacheStore>,
    network: Arc<dyn NetworkClient>,
    version: impl Into<String>,
    manifest: Vec<String>,
  ) -> Self {
    Self {
      store,
      network,
      version: version.into(),
      manifest,
    }
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  /// Populate the current version's cache from the static asset manifest.
  ///
  /// All-or-nothing: every manifest URL must fetch successfully before
  /// anything is committed, and a single failure fails the whole install
  /// attempt with zero entries stored.
  pub async fn install(&self) -> Result<()> {
    let fetches = self.manifest.iter().map(|path| {
      let request = Request::get(path.clone());
      async move {
        let response = self
          .network
          .fetch(&request)
          .await
          .map_err(|e| eyre!("Install fetch failed for {}: {}", path, e))?;

        if !response.is_ok() {
          return Err(eyre!(
            "Install fetch for {} returned status {}",
            path,
            response.status
          ));
        }

        Ok((request, response))
      }
    });

    let entries = future::try_join_all(fetches).await?;
    self.store.put_all(&self.version, &entries)?;

    info!(version = %self.version, assets = entries.len(), "static cache populated");
    Ok(())
  }

  /// Purge every stored cache version except the current one, then take
  /// control of open client pages without waiting for a reload.
  pub async fn activate(&self, clients: &dyn ClientRegistry) -> Result<()> {
    for version in self.store.versions()? {
      if version != self.version {
        self.store.delete_version(&version)?;
        info!(stale = %version, current = %self.version, "purged stale cache version");
      }
    }

    clients.claim().await?;
    info!(version = %self.version, "activated");
    Ok(())
  }
}
