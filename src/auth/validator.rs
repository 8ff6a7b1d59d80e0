//! Token validation against the configured token set
//!
//! Tokens are held only as SHA-256 digests. A candidate is digested once and
//! compared against every member of the selected set with
//! [`subtle::ConstantTimeEq`]; the digests have a fixed length, so neither the
//! position of the first differing byte nor the candidate's length changes the
//! amount of work done per comparison.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};

use crate::config::Config;

type TokenDigest = [u8; 32];

fn digest(token: &str) -> TokenDigest {
    Sha256::digest(token.as_bytes()).into()
}

/// Configured tokens, per service plus an optional fallback
///
/// Empty token values are never stored: a service configured with an empty
/// or missing token is "not configured" and can never match.
#[derive(Clone, Default)]
pub struct TokenSet {
    services: BTreeMap<String, TokenDigest>,
    fallback: Option<TokenDigest>,
}

impl TokenSet {
    /// Create an empty token set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the token for `service`
    pub fn with_service(mut self, service: impl Into<String>, token: &str) -> Self {
        let service = service.into();
        if token.is_empty() {
            self.services.remove(&service);
        } else {
            self.services.insert(service, digest(token));
        }
        self
    }

    /// Set the fallback token
    pub fn with_fallback(mut self, token: &str) -> Self {
        self.fallback = (!token.is_empty()).then(|| digest(token));
        self
    }

    /// Build the token set from configuration
    pub fn from_config(config: &Config) -> Self {
        let mut set = config
            .tokens
            .iter()
            .fold(Self::new(), |set, (service, token)| match token {
                Some(token) => set.with_service(service.clone(), token),
                None => set,
            });
        if let Some(fallback) = &config.fallback_token {
            set = set.with_fallback(fallback);
        }
        set
    }

    /// Whether `service` has a usable token
    pub fn is_configured(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Whether a fallback token is configured
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Names of services with a usable token
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Whether no token at all is configured
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.fallback.is_none()
    }

    /// Check `candidate` against the tokens selected by `service`
    ///
    /// With a service, only that service's token is eligible; an unconfigured
    /// service never falls back to the fallback token. Without a service, every
    /// service token and the fallback token are eligible.
    pub fn validate(&self, candidate: &str, service: Option<&str>) -> bool {
        if candidate.is_empty() {
            return false;
        }

        let candidate = digest(candidate);
        let mut matched = Choice::from(0);
        for configured in self.eligible(service) {
            matched |= configured[..].ct_eq(&candidate[..]);
        }
        matched.into()
    }

    fn eligible<'a>(&'a self, service: Option<&str>) -> Vec<&'a TokenDigest> {
        match service {
            Some(service) => self.services.get(service).into_iter().collect(),
            None => self.services.values().chain(self.fallback.iter()).collect(),
        }
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
