//! Rate limiter for authentication failures
//!
//! This module provides per-client rate limiting for failed authentication
//! attempts. After a configurable number of failures, a client key is locked
//! out until the lockout duration passes without further failures.
//!
//! Counters live in a [`CounterStore`]; the limiter owns only the policy. The
//! window is sliding: every failure pushes the key's expiry to
//! `now + lockout_duration`, so a lockout is restarted when the threshold is
//! reached and is never shortened by later failures.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::identity::RateLimitKey;
use crate::config::RateLimitingConfig;
use crate::error::StoreError;
use crate::store::CounterStore;

/// What `check` reports when the counter store fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFailurePolicy {
    /// Treat the client as not blocked; rate limiting degrades to disabled
    #[default]
    Open,
    /// Treat the client as blocked
    Closed,
}

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Whether the lockout is enforced
    pub enabled: bool,

    /// Number of failures that locks a key
    pub max_attempts: u32,

    /// How long a key stays tracked after its last failure
    pub lockout_duration: Duration,

    /// Behaviour of `check` when the store fails
    pub on_store_error: StoreFailurePolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 60,
            lockout_duration: Duration::from_secs(60),
            on_store_error: StoreFailurePolicy::Open,
        }
    }
}

impl From<&RateLimitingConfig> for RateLimitConfig {
    fn from(config: &RateLimitingConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts,
            lockout_duration: Duration::from_secs(config.lockout_duration_secs),
            on_store_error: config.on_store_error,
        }
    }
}

/// Per-key lockout state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No recent failures
    Clear,
    /// Failures recorded, below the threshold
    Counting(u64),
    /// Threshold reached within the current window
    Locked(u64),
}

/// Rate limiter for authentication failures
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a new rate limiter over `store`
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Current state of `key`, independent of the `enabled` flag
    pub async fn state(&self, key: &RateLimitKey) -> Result<LockState, StoreError> {
        let count = self.store.get(key.as_str()).await?;
        Ok(self.classify(count))
    }

    /// Whether `key` is currently locked out
    ///
    /// Always `false` when rate limiting is disabled. Does not mutate state.
    pub async fn check(&self, key: &RateLimitKey) -> bool {
        if !self.config.enabled {
            return false;
        }

        match self.state(key).await {
            Ok(state) => matches!(state, LockState::Locked(_)),
            Err(e) => {
                let blocked = self.config.on_store_error == StoreFailurePolicy::Closed;
                tracing::warn!(
                    error = %e,
                    key = %key,
                    blocked,
                    "Counter store unavailable during lockout check"
                );
                blocked
            }
        }
    }

    /// Record a failed attempt for `key`
    ///
    /// Returns the resulting state.
    pub async fn hit(&self, key: &RateLimitKey) -> Result<LockState, StoreError> {
        let count = self
            .store
            .increment(key.as_str(), self.config.lockout_duration)
            .await?;
        let state = self.classify(count);

        if count == u64::from(self.config.max_attempts) {
            tracing::info!(
                key = %key,
                lockout_secs = self.config.lockout_duration.as_secs(),
                "Client locked out after repeated authentication failures"
            );
        }

        Ok(state)
    }

    /// Forget all failures for `key`
    pub async fn clear(&self, key: &RateLimitKey) -> Result<(), StoreError> {
        self.store.reset(key.as_str()).await
    }

    fn classify(&self, count: u64) -> LockState {
        match count {
            0 => LockState::Clear,
            n if n >= u64::from(self.config.max_attempts) => LockState::Locked(n),
            n => LockState::Counting(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::ClientIdentity;
    use crate::store::{MemoryCounterStore, MockCounterStore};
    use std::net::{IpAddr, Ipv4Addr};

    fn test_key() -> RateLimitKey {
        ClientIdentity::from(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))).rate_limit_key()
    }

    fn test_key2() -> RateLimitKey {
        ClientIdentity::from(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2))).rate_limit_key()
    }

    fn limiter(max_attempts: u32, lockout: Duration) -> RateLimiter {
        let config = RateLimitConfig {
            max_attempts,
            lockout_duration: lockout,
            ..Default::default()
        };
        RateLimiter::new(config, Arc::new(MemoryCounterStore::new()))
    }

    // Test 1: Unknown keys are clear
    #[tokio::test]
    async fn test_unknown_key_is_clear() {
        let limiter = limiter(3, Duration::from_secs(60));
        assert_eq!(limiter.state(&test_key()).await.unwrap(), LockState::Clear);
        assert!(!limiter.check(&test_key()).await);
    }

    // Test 2: Key is not blocked until max attempts
    #[tokio::test]
    async fn test_not_blocked_until_max_attempts() {
        let limiter = limiter(3, Duration::from_secs(60));
        let key = test_key();

        assert_eq!(limiter.hit(&key).await.unwrap(), LockState::Counting(1));
        assert_eq!(limiter.hit(&key).await.unwrap(), LockState::Counting(2));
        assert!(!limiter.check(&key).await);

        assert_eq!(limiter.hit(&key).await.unwrap(), LockState::Locked(3));
        assert!(limiter.check(&key).await);
    }

    // Test 3: Clear resets the key
    #[tokio::test]
    async fn test_clear_resets_key() {
        let limiter = limiter(2, Duration::from_secs(60));
        let key = test_key();

        limiter.hit(&key).await.unwrap();
        limiter.hit(&key).await.unwrap();
        assert!(limiter.check(&key).await);

        limiter.clear(&key).await.unwrap();
        assert!(!limiter.check(&key).await);
        assert_eq!(limiter.state(&key).await.unwrap(), LockState::Clear);
    }

    // Test 4: Different keys are tracked separately
    #[tokio::test]
    async fn test_keys_tracked_separately() {
        let limiter = limiter(1, Duration::from_secs(60));

        limiter.hit(&test_key()).await.unwrap();

        assert!(limiter.check(&test_key()).await);
        assert!(!limiter.check(&test_key2()).await);
    }

    // Test 5: Disabled limiter never blocks, whatever was recorded
    #[tokio::test]
    async fn test_disabled_never_blocks() {
        let config = RateLimitConfig {
            enabled: false,
            max_attempts: 1,
            ..Default::default()
        };
        let limiter = RateLimiter::new(config, Arc::new(MemoryCounterStore::new()));
        let key = test_key();

        for _ in 0..5 {
            limiter.hit(&key).await.unwrap();
        }

        assert_eq!(limiter.state(&key).await.unwrap(), LockState::Locked(5));
        assert!(!limiter.check(&key).await);
    }

    // Test 6: Lockout expires after the lockout duration
    #[tokio::test]
    async fn test_lockout_expires() {
        let limiter = limiter(1, Duration::from_millis(20));
        let key = test_key();

        limiter.hit(&key).await.unwrap();
        assert!(limiter.check(&key).await);

        std::thread::sleep(Duration::from_millis(50));
        assert!(!limiter.check(&key).await);
    }

    // Test 7: Sliding window: a hit while locked extends the lockout
    #[tokio::test]
    async fn test_hit_while_locked_extends_lockout() {
        let limiter = limiter(1, Duration::from_millis(200));
        let key = test_key();

        limiter.hit(&key).await.unwrap();
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(limiter.hit(&key).await.unwrap(), LockState::Locked(2));

        // 240ms after the first hit, 120ms after the second
        std::thread::sleep(Duration::from_millis(120));
        assert!(limiter.check(&key).await);
    }

    // Test 8: Sliding window: counting state decays without failures
    #[tokio::test]
    async fn test_counting_decays() {
        let limiter = limiter(3, Duration::from_millis(20));
        let key = test_key();

        limiter.hit(&key).await.unwrap();
        limiter.hit(&key).await.unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(limiter.hit(&key).await.unwrap(), LockState::Counting(1));
    }

    // Test 9: Store outage fails open by default
    #[tokio::test]
    async fn test_store_outage_fails_open() {
        let mut store = MockCounterStore::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));

        let limiter = RateLimiter::new(RateLimitConfig::default(), Arc::new(store));
        assert!(!limiter.check(&test_key()).await);
    }

    // Test 10: Store outage fails closed when configured
    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let mut store = MockCounterStore::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));

        let config = RateLimitConfig {
            on_store_error: StoreFailurePolicy::Closed,
            ..Default::default()
        };
        let limiter = RateLimiter::new(config, Arc::new(store));
        assert!(limiter.check(&test_key()).await);
    }

    // Test 11: Disabled limiter does not even consult the store
    #[tokio::test]
    async fn test_disabled_skips_store() {
        let mut store = MockCounterStore::new();
        store.expect_get().never();

        let config = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };
        let limiter = RateLimiter::new(config, Arc::new(store));
        assert!(!limiter.check(&test_key()).await);
    }

    // Test 12: Hits use the lockout duration as the key TTL
    #[tokio::test]
    async fn test_hit_passes_lockout_ttl() {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .withf(|_, ttl| *ttl == Duration::from_secs(90))
            .times(1)
            .returning(|_, _| Ok(1));

        let config = RateLimitConfig {
            lockout_duration: Duration::from_secs(90),
            ..Default::default()
        };
        let limiter = RateLimiter::new(config, Arc::new(store));
        assert_eq!(
            limiter.hit(&test_key()).await.unwrap(),
            LockState::Counting(1)
        );
    }

    // Test 13: Config conversion from the file format
    #[test]
    fn test_from_rate_limiting_config() {
        let file = RateLimitingConfig {
            enabled: false,
            max_attempts: 7,
            lockout_duration_secs: 30,
            on_store_error: StoreFailurePolicy::Closed,
        };
        let config = RateLimitConfig::from(&file);
        assert!(!config.enabled);
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.lockout_duration, Duration::from_secs(30));
        assert_eq!(config.on_store_error, StoreFailurePolicy::Closed);
    }
}
