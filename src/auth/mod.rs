//! Authentication system for token-gate
//!
//! This module provides the static shared-secret authentication gate:
//! - Credential extraction from request headers
//! - Constant-time token validation, optionally scoped per service
//! - Rate limiting for failed attempts, keyed by hashed client identity
//! - Audit logging of failed attempts without token material

pub mod audit;
pub mod extract;
pub mod gate;
pub mod identity;
pub mod ratelimit;
pub mod token;
pub mod validator;

pub use audit::{AuditLogger, AuditSink, TracingAuditSink, FAILED_ATTEMPT_MESSAGE};
pub use extract::{extract_token, API_TOKEN_HEADER};
pub use gate::{AuthDecision, AuthRequest, GateSettings, GateSnapshot, TokenGate};
pub use identity::{ClientIdentity, RateLimitKey};
pub use ratelimit::{LockState, RateLimitConfig, RateLimiter, StoreFailurePolicy};
pub use token::{generate_token, mask_token, TokenError};
pub use validator::TokenSet;
