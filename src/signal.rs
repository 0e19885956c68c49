//! Explicit observer/subscription hub.
//!
//! Replaces ad-hoc listener callbacks with a subscription object that
//! unsubscribes on drop, so observers cannot leak across page navigations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Subscribers<T> = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<T>>>>;

/// Broadcast hub for a single signal type.
pub struct SignalHub<T> {
  subscribers: Subscribers<T>,
  next_id: Arc<AtomicU64>,
}

impl<T: Clone> SignalHub<T> {
  pub fn new() -> Self {
    Self {
      subscribers: Arc::new(Mutex::new(HashMap::new())),
      next_id: Arc::new(AtomicU64::new(1)),
    }
  }

  /// Register an observer. Dropping the returned subscription unsubscribes.
  pub fn subscribe(&self) -> Subscription<T> {
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    let (tx, rx) = mpsc::unbounded_channel();

    if let Ok(mut subscribers) = self.subscribers.lock() {
      subscribers.insert(id, tx);
    }

    Subscription {
      id,
      rx,
      subscribers: Arc::clone(&self.subscribers),
    }
  }

  /// Deliver a value to every live subscriber.
  pub fn publish(&self, value: T) {
    let Ok(mut subscribers) = self.subscribers.lock() else {
      return;
    };
    subscribers.retain(|_, tx| tx.send(value.clone()).is_ok());
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
  }
}

impl<T: Clone> Default for SignalHub<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Clone for SignalHub<T> {
  fn clone(&self) -> Self {
    Self {
      subscribers: Arc::clone(&self.subscribers),
      next_id: Arc::clone(&self.next_id),
    }
  }
}

/// Handle to one subscription; receives published values until dropped.
pub struct Subscription<T> {
  id: u64,
  rx: mpsc::UnboundedReceiver<T>,
  subscribers: Subscribers<T>,
}

impl<T> Subscription<T> {
  /// Receive the next published value, or None once the hub is gone.
  pub async fn recv(&mut self) -> Option<T> {
    self.rx.recv().await
  }
}

impl<T> Drop for Subscription<T> {
  fn drop(&mut self) {
    if let Ok(mut subscribers) = self.subscribers.lock() {
      subscribers.remove(&self.id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_publish_reaches_subscriber() {
    let hub = SignalHub::new();
    let mut sub = hub.subscribe();

    hub.publish(42u32);
    assert_eq!(sub.recv().await, Some(42));
  }

  #[tokio::test]
  async fn test_publish_reaches_all_subscribers() {
    let hub = SignalHub::new();
    let mut a = hub.subscribe();
    let mut b = hub.subscribe();

    hub.publish("hello".to_string());
    assert_eq!(a.recv().await.as_deref(), Some("hello"));
    assert_eq!(b.recv().await.as_deref(), Some("hello"));
  }

  #[tokio::test]
  async fn test_drop_unsubscribes() {
    let hub = SignalHub::new();
    let sub = hub.subscribe();
    assert_eq!(hub.subscriber_count(), 1);

    drop(sub);
    assert_eq!(hub.subscriber_count(), 0);

    // Publishing to an empty hub is a no-op
    hub.publish(1u8);
  }

  #[tokio::test]
  async fn test_values_published_before_drop_are_not_leaked_to_others() {
    let hub = SignalHub::new();
    let mut kept = hub.subscribe();
    let dropped = hub.subscribe();
    drop(dropped);

    hub.publish(7i32);
    assert_eq!(kept.recv().await, Some(7));
    assert_eq!(hub.subscriber_count(), 1);
  }
}
