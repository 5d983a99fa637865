//! Memory management module.
//!
//! Provides the incremental decoder cache shared by the step function and
//! the scoring networks.

mod cache_store;

pub use cache_store::{CacheEntry, CacheError, CacheStats, CacheStore};
