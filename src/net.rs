//! Network seam: the trait the cache manager, interceptor and sync
//! coordinator fetch through, plus the reqwest-backed implementation and the
//! connectivity probe that drives sync triggers.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::http::{Method, Request, Response, ResponseKind};
use crate::signal::SignalHub;

/// Trait for issuing network requests.
///
/// Everything that touches the network goes through this seam so the sync
/// flow is testable without a live backend.
#[async_trait]
pub trait NetworkClient: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// reqwest-backed client resolving origin-relative paths against the
/// configured page origin.
pub struct ReqwestClient {
  client: reqwest::Client,
  origin: Url,
}

impl ReqwestClient {
  pub fn new(origin: &str) -> Result<Self> {
    let origin =
      Url::parse(origin).map_err(|e| eyre!("Invalid origin URL {}: {}", origin, e))?;

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client, origin })
  }

  /// Resolve a request URL, joining origin-relative paths onto the origin.
  fn absolute(&self, raw: &str) -> Result<Url> {
    Url::parse(raw)
      .or_else(|_| self.origin.join(raw))
      .map_err(|e| eyre!("Invalid request URL {}: {}", raw, e))
  }
}

#[async_trait]
impl NetworkClient for ReqwestClient {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = self.absolute(&request.url)?;

    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      Method::Head => reqwest::Method::HEAD,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
    };

    let mut builder = self.client.request(method, url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Fetch failed for {}: {}", request.url, e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let kind = if url.origin() == self.origin.origin() {
      ResponseKind::Basic
    } else {
      ResponseKind::Cors
    };
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body for {}: {}", request.url, e))?
      .to_vec();

    debug!(url = %request.url, status, "network fetch");

    Ok(Response {
      status,
      kind,
      headers,
      body,
    })
  }
}

/// Connectivity as observed by the probe task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
  Online,
  Offline,
}

/// Spawn a task that probes the given path periodically and publishes every
/// connectivity transition to the hub.
///
/// The probe starts from `Offline`, so the first successful probe after a
/// process restart publishes `Online` and drains whatever the outbox kept
/// across the restart.
pub fn spawn_probe(
  network: Arc<dyn NetworkClient>,
  probe_path: String,
  interval: Duration,
  hub: SignalHub<Connectivity>,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let mut last = Connectivity::Offline;
    loop {
      let state = match network.fetch(&Request::get(&probe_path)).await {
        Ok(response) if response.is_ok() => Connectivity::Online,
        _ => Connectivity::Offline,
      };

      if state != last {
        info!(?state, "connectivity changed");
        hub.publish(state);
        last = state;
      }

      tokio::time::sleep(interval).await;
    }
  })
}

#[cfg(test)]
mod tests {
  use super::testing::MockNetwork;
  use super::*;
  use std::sync::atomic::{AtomicBool, Ordering};

  #[tokio::test]
  async fn test_probe_publishes_transitions_only() {
    let up = Arc::new(AtomicBool::new(false));
    let up_for_handler = Arc::clone(&up);
    let network = Arc::new(MockNetwork::new(move |_| {
      if up_for_handler.load(Ordering::SeqCst) {
        Ok(Response::new(200))
      } else {
        Err("offline".to_string())
      }
    }));

    let hub = SignalHub::new();
    let mut sub = hub.subscribe();
    let probe = spawn_probe(
      network,
      "/".to_string(),
      Duration::from_millis(5),
      hub.clone(),
    );

    // Starts offline and the probe starts from Offline, so nothing is
    // published until connectivity actually returns.
    up.store(true, Ordering::SeqCst);
    assert_eq!(sub.recv().await, Some(Connectivity::Online));

    up.store(false, Ordering::SeqCst);
    assert_eq!(sub.recv().await, Some(Connectivity::Offline));

    probe.abort();
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  type Handler = Box<dyn Fn(&Request) -> Result<Response, String> + Send + Sync>;

  /// Scripted network for tests, with a call counter for the cache-first
  /// invariant checks.
  pub struct MockNetwork {
    handler: Handler,
    calls: AtomicUsize,
  }

  impl MockNetwork {
    pub fn new(
      handler: impl Fn(&Request) -> Result<Response, String> + Send + Sync + 'static,
    ) -> Self {
      Self {
        handler: Box::new(handler),
        calls: AtomicUsize::new(0),
      }
    }

    /// Network that answers every request with the same response.
    pub fn always(response: Response) -> Self {
      Self::new(move |_| Ok(response.clone()))
    }

    /// Network where every request errors.
    pub fn unreachable() -> Self {
      Self::new(|request| Err(format!("network unreachable: {}", request.url)))
    }

    pub fn call_count(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl NetworkClient for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      (self.handler)(request).map_err(|e| eyre!(e))
    }
  }
}
