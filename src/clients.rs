//! Client-window registry seam.
//!
//! The worker does not own page windows; it asks this collaborator to take
//! control of them at activation and to focus or open them when a
//! notification is clicked.

use async_trait::async_trait;
use color_eyre::Result;
use tracing::info;

/// One open client page.
#[derive(Debug, Clone)]
pub struct ClientWindow {
  pub id: String,
  pub url: String,
}

#[async_trait]
pub trait ClientRegistry: Send + Sync {
  /// Take control of all open client pages immediately, without waiting for
  /// a reload.
  async fn claim(&self) -> Result<()>;

  /// Snapshot of currently open windows.
  async fn windows(&self) -> Result<Vec<ClientWindow>>;

  /// Bring an existing window to the foreground.
  async fn focus(&self, id: &str) -> Result<()>;

  /// Open a new window at the given URL.
  async fn open(&self, url: &str) -> Result<()>;
}

/// Registry backing for a headless deployment: there is no window system to
/// drive, so every operation just records what would have happened.
pub struct LogClients;

#[async_trait]
impl ClientRegistry for LogClients {
  async fn claim(&self) -> Result<()> {
    info!("claimed open clients");
    Ok(())
  }

  async fn windows(&self) -> Result<Vec<ClientWindow>> {
    Ok(Vec::new())
  }

  async fn focus(&self, id: &str) -> Result<()> {
    info!(window = %id, "focus window");
    Ok(())
  }

  async fn open(&self, url: &str) -> Result<()> {
    info!(%url, "open window");
    Ok(())
  }
}
