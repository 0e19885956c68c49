//! Durable outbox for deferred writes.
//!
//! Writes that fail while offline are queued here and replayed by the sync
//! coordinator once connectivity returns, possibly in a later process.

mod store;
mod types;

pub use store::{OutboxStore, SqliteOutbox};
pub use types::{OutboxItem, OutboxKind};
