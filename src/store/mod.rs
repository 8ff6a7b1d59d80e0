//! Counter store abstraction for rate limiting
//!
//! The rate limiter never keeps counters itself; it talks to a [`CounterStore`]
//! that owns atomicity and expiry. [`MemoryCounterStore`] is the in-process
//! implementation used by the binary and the tests.

pub mod memory;

pub use memory::MemoryCounterStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Key/value counter service with per-key expiry
///
/// Implementations must make `increment` atomic per key: concurrent callers
/// each observe a distinct post-increment value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` and return the new value
    ///
    /// The key expires `ttl` after this call unless incremented again.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Remove the counter for `key`
    async fn reset(&self, key: &str) -> Result<(), StoreError>;

    /// Current value for `key`, zero when absent or expired
    async fn get(&self, key: &str) -> Result<u64, StoreError>;
}
