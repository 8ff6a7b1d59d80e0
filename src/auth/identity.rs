//! Client identity and rate-limit key derivation

use std::fmt;
use std::net::IpAddr;

use sha2::{Digest, Sha256};

/// Namespace prefix for rate-limit keys in the counter store
pub const RATE_LIMIT_KEY_PREFIX: &str = "token-gate|";

/// Stable identity of the requesting client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    /// Source address of the connection
    Addr(IpAddr),
    /// No address available (e.g. a transport without peer info)
    Unknown,
}

impl ClientIdentity {
    /// Counter-store key for this client
    ///
    /// The key is a one-way hash of the identity, so the store never holds
    /// raw addresses.
    pub fn rate_limit_key(&self) -> RateLimitKey {
        let hashed = Sha256::digest(self.to_string().as_bytes());
        RateLimitKey(format!("{}{}", RATE_LIMIT_KEY_PREFIX, hex::encode(hashed)))
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(ip: IpAddr) -> Self {
        ClientIdentity::Addr(ip)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdentity::Addr(ip) => write!(f, "{}", ip),
            ClientIdentity::Unknown => f.write_str("unknown"),
        }
    }
}

/// Hashed counter-store key for one client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
