//! Versioned static-asset cache.
//!
//! One cache generation ("version") is current at any time; install
//! populates the next generation atomically and activate purges the rest.

mod manager;
mod store;

pub use manager::CacheManager;
pub use store::{CacheStore, SqliteCacheStore};
