//! Authentication gate
//!
//! This module provides the per-request authentication decision. It composes
//! the lockout check, credential extraction, token validation, the rate-limiter
//! update and the audit record:
//!
//! 1. a locked-out client is rejected before anything else runs;
//! 2. otherwise the candidate token is validated;
//! 3. a failure records a hit (and an audit record), a success clears the key.
//!
//! Exactly one rate-limiter mutation happens per request that is not locked
//! out, and none for a locked-out request.

use std::borrow::Cow;
use std::sync::{Arc, PoisonError, RwLock};

use axum::http::HeaderMap;

use crate::config::Config;
use crate::error::AuthError;
use crate::store::CounterStore;

use super::audit::{AuditLogger, AuditSink};
use super::extract::extract_token;
use super::identity::ClientIdentity;
use super::ratelimit::{RateLimitConfig, RateLimiter};
use super::validator::TokenSet;

const REDACTED: &str = "[REDACTED]";

/// Shortest candidate scrubbed from anywhere in an audited URL
const MIN_SUBSTRING_REDACT_LEN: usize = 16;

/// Settings the gate is built from
#[derive(Debug, Clone, Default)]
pub struct GateSettings {
    /// Configured tokens
    pub tokens: TokenSet,

    /// Rate limit configuration
    pub rate_limit: RateLimitConfig,

    /// Whether failed attempts are audited
    pub log_failed_attempts: bool,
}

impl From<&Config> for GateSettings {
    fn from(config: &Config) -> Self {
        Self {
            tokens: TokenSet::from_config(config),
            rate_limit: RateLimitConfig::from(&config.rate_limiting),
            log_failed_attempts: config.log_failed_attempts,
        }
    }
}

/// Outcome of token validation for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    /// Whether the candidate matched an eligible token
    pub allowed: bool,

    /// Service scope the request was authenticated for
    pub matched_service: Option<String>,
}

/// What the gate needs to know about a request
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    /// Request headers
    pub headers: &'a HeaderMap,

    /// Client the request came from
    pub identity: ClientIdentity,

    /// Full request URL, for the audit record
    pub url: &'a str,
}

/// Immutable view of the gate configuration
///
/// Requests hold an `Arc` to one snapshot for their whole lifetime, so a
/// reload never exposes a mix of old and new settings.
pub struct GateSnapshot {
    tokens: TokenSet,
    limiter: RateLimiter,
    audit: AuditLogger,
}

impl GateSnapshot {
    fn new(
        settings: GateSettings,
        store: Arc<dyn CounterStore>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            tokens: settings.tokens,
            limiter: RateLimiter::new(settings.rate_limit, store),
            audit: AuditLogger::new(settings.log_failed_attempts, sink),
        }
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Validate `candidate` for `service`
    pub fn decide(&self, candidate: &str, service: Option<&str>) -> AuthDecision {
        let allowed = self.tokens.validate(candidate, service);
        AuthDecision {
            allowed,
            matched_service: service.filter(|_| allowed).map(str::to_string),
        }
    }
}

/// Authentication gate
///
/// Holds the current [`GateSnapshot`] plus the shared counter store and audit
/// sink that every snapshot is built on.
pub struct TokenGate {
    snapshot: RwLock<Arc<GateSnapshot>>,
    store: Arc<dyn CounterStore>,
    sink: Arc<dyn AuditSink>,
}

impl TokenGate {
    /// Create a new gate
    pub fn new(
        settings: GateSettings,
        store: Arc<dyn CounterStore>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let snapshot = GateSnapshot::new(settings, Arc::clone(&store), Arc::clone(&sink));
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            store,
            sink,
        }
    }

    /// Create a gate from configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CounterStore>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self::new(GateSettings::from(config), store, sink)
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<GateSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the whole configuration snapshot
    ///
    /// Requests already in flight finish on the snapshot they started with.
    /// Rate-limit counters survive a reload.
    pub fn reload(&self, settings: GateSettings) {
        let next = Arc::new(GateSnapshot::new(
            settings,
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
        ));
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        tracing::info!("Token gate configuration reloaded");
    }

    /// Authenticate one request, optionally scoped to `service`
    ///
    /// `Ok` always carries an allowed decision.
    pub async fn authenticate(
        &self,
        request: &AuthRequest<'_>,
        service: Option<&str>,
    ) -> Result<AuthDecision, AuthError> {
        let snapshot = self.snapshot();
        let key = request.identity.rate_limit_key();

        if snapshot.limiter.check(&key).await {
            tracing::debug!(key = %key, "Rejected locked-out client");
            return Err(AuthError::RateLimitExceeded);
        }

        let candidate = extract_token(request.headers).unwrap_or_default();
        let decision = snapshot.decide(candidate, service);

        if !decision.allowed {
            if let Err(e) = snapshot.limiter.hit(&key).await {
                tracing::warn!(error = %e, key = %key, "Failed to record authentication failure");
            }
            snapshot
                .audit
                .record(&request.identity, &redact(request.url, candidate));
            return Err(AuthError::Unauthenticated);
        }

        if let Err(e) = snapshot.limiter.clear(&key).await {
            tracing::warn!(error = %e, key = %key, "Failed to clear authentication failures");
        }

        tracing::debug!(service = ?decision.matched_service, "Token authentication succeeded");
        Ok(decision)
    }
}

/// Scrub the candidate out of `url`
///
/// Query values equal to the candidate are always replaced. Other occurrences
/// are replaced only for candidates of at least `MIN_SUBSTRING_REDACT_LEN`
/// bytes, so markers around a short guess never spell out its characters.
fn redact<'a>(url: &'a str, candidate: &str) -> Cow<'a, str> {
    if candidate.is_empty() || !url.contains(candidate) {
        return Cow::Borrowed(url);
    }

    let scrubbed: Cow<'a, str> = match url.split_once('?') {
        Some((base, query))
            if query.split('&').any(|pair| query_value(pair) == candidate) =>
        {
            let query = query
                .split('&')
                .map(|pair| match pair.split_once('=') {
                    Some((name, value)) if value == candidate => {
                        format!("{}={}", name, REDACTED)
                    }
                    None if pair == candidate => REDACTED.to_string(),
                    _ => pair.to_string(),
                })
                .collect::<Vec<_>>()
                .join("&");
            Cow::Owned(format!("{}?{}", base, query))
        }
        _ => Cow::Borrowed(url),
    };

    if candidate.len() >= MIN_SUBSTRING_REDACT_LEN && scrubbed.contains(candidate) {
        Cow::Owned(scrubbed.replace(candidate, REDACTED))
    } else {
        scrubbed
    }
}

fn query_value(pair: &str) -> &str {
    pair.split_once('=').map_or(pair, |(_, value)| value)
}
