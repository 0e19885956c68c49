//! Push-notification payload handling and notification click routing.

use async_trait::async_trait;
use color_eyre::Result;
use serde::Deserialize;
use tracing::info;

use crate::clients::ClientRegistry;

/// Icon shown on every notification.
pub const NOTIFICATION_ICON: &str = "/images/logo.png";
/// Badge shown on every notification.
pub const NOTIFICATION_BADGE: &str = "/images/badge.png";
/// Vibration pattern applied to every notification.
pub const VIBRATION_PATTERN: [u32; 3] = [100, 50, 100];

/// Wire payload of a push event.
#[derive(Debug, Deserialize)]
struct PushPayload {
  title: String,
  message: String,
  #[serde(default)]
  link: Option<String>,
}

/// A platform notification ready to display.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  /// Window URL targeted when the notification is clicked.
  pub url: String,
}

/// Build the notification for a push event's data, if any.
///
/// A push with no data or a malformed payload is ignored entirely: no
/// notification, no error.
pub fn notification_for(data: Option<&[u8]>) -> Option<Notification> {
  let payload: PushPayload = serde_json::from_slice(data?).ok()?;

  Some(Notification {
    title: payload.title,
    body: payload.message,
    icon: NOTIFICATION_ICON.to_string(),
    badge: NOTIFICATION_BADGE.to_string(),
    vibrate: VIBRATION_PATTERN.to_vec(),
    url: payload.link.unwrap_or_else(|| "/".to_string()),
  })
}

/// Seam for displaying platform notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Notifier for a headless deployment: logs what would have been shown.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn show(&self, notification: &Notification) -> Result<()> {
    info!(title = %notification.title, url = %notification.url, "notification shown");
    Ok(())
  }
}

/// Handle a click on a previously shown notification: focus the first open
/// client window already at the target URL, or open a new one.
pub async fn handle_notification_click(clients: &dyn ClientRegistry, url: &str) -> Result<()> {
  for window in clients.windows().await? {
    if window.url == url {
      return clients.focus(&window.id).await;
    }
  }
  clients.open(url).await
}
