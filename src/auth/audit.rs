//! Audit logging of failed authentication attempts
//!
//! [`AuditLogger::record`] takes only the client identity and the request URL,
//! so no token value can reach the sink. Sink failures are swallowed: the
//! audit trail is best-effort and never changes an authentication decision.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::identity::ClientIdentity;
use crate::error::AuditError;

/// Message of the failed-attempt audit record
pub const FAILED_ATTEMPT_MESSAGE: &str = "Failed token authentication attempt.";

/// Structured fields of an audit record
pub type AuditFields = BTreeMap<String, String>;

/// Destination for audit records
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    /// Emit a warning-level record
    fn warn(&self, message: &str, fields: &AuditFields) -> Result<(), AuditError>;
}

/// [`AuditSink`] writing to `tracing` under the `token_gate::audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn warn(&self, message: &str, fields: &AuditFields) -> Result<(), AuditError> {
        let ip = fields.get("ip").map(String::as_str).unwrap_or("-");
        let url = fields.get("url").map(String::as_str).unwrap_or("-");
        tracing::warn!(target: "token_gate::audit", ip = %ip, url = %url, "{}", message);
        Ok(())
    }
}

/// Records failed attempts when enabled
#[derive(Clone)]
pub struct AuditLogger {
    enabled: bool,
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(enabled: bool, sink: Arc<dyn AuditSink>) -> Self {
        Self { enabled, sink }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a failed attempt from `identity` against `url`
    pub fn record(&self, identity: &ClientIdentity, url: &str) {
        if !self.enabled {
            return;
        }

        let mut fields = AuditFields::new();
        fields.insert("ip".to_string(), identity.to_string());
        fields.insert("url".to_string(), url.to_string());

        if let Err(e) = self.sink.warn(FAILED_ATTEMPT_MESSAGE, &fields) {
            tracing::debug!(error = %e, "Dropped audit record");
        }
    }
}
