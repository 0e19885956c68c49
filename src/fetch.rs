//! Fetch interception: cache-first for static resources, straight
//! pass-through for dynamic API calls.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::http::{Request, Response};
use crate::net::NetworkClient;

/// Per-request routing between cache and network.
#[derive(Clone)]
pub struct FetchInterceptor {
  store: Arc<dyn CacheStore>,
  network: Arc<dyn NetworkClient>,
  version: String,
  /// Path prefix of dynamic API calls, which bypass the cache entirely.
  api_prefix: String,
}

impl FetchInterceptor {
  pub fn new(
    store: Arc<dyn CacheStore>,
    network: Arc<dyn NetworkClient>,
    version: impl Into<String>,
    api_prefix: impl Into<String>,
  ) -> Self {
    Self {
      store,
      network,
      version: version.into(),
      api_prefix: api_prefix.into(),
    }
  }

  fn is_api(&self, request: &Request) -> bool {
    request.path().starts_with(&self.api_prefix)
  }

  /// Route one outgoing request.
  ///
  /// API paths go straight to the network, never cached and never read from
  /// cache; write-failure handling for those lives in the outbox path and is
  /// triggered by the calling code. Everything else is cache-first: a stored
  /// entry for the exact (method, URL) identity is returned without a
  /// network round-trip, a miss fetches from the network and caches a 200
  /// same-origin response. Network errors and non-cacheable responses are
  /// returned unchanged, with no fallback page and no retry.
  pub async fn handle(&self, request: &Request) -> Result<Response> {
    if self.is_api(request) {
      return self.network.fetch(request).await;
    }

    if let Some(cached) = self.store.get(&self.version, request.method, &request.url)? {
      debug!(url = %request.url, "served from cache");
      return Ok(cached);
    }

    let response = self.network.fetch(request).await?;

    if response.is_cacheable() {
      // The caller already has its response; a failed cache write only
      // costs the next request a network round-trip
      match self.store.put(&self.version, request, &response) {
        Ok(()) => debug!(url = %request.url, "cached network response"),
        Err(e) => warn!(url = %request.url, error = %e, "failed to cache response"),
      }
    }

    Ok(response)
  }
}
