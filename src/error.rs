//! Application error types for token-gate
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.
//!
//! None of these types ever carry token material: the only strings they hold
//! are store/sink diagnostics and configuration messages.

use thiserror::Error;

use crate::auth::token::TokenError;
use crate::config::ConfigError;

/// Authentication outcomes that are surfaced to the caller
///
/// Every rejection reason (missing header, malformed header, unknown service,
/// wrong token) folds into `Unauthenticated` so they cannot be told apart.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Empty, absent, malformed or mismatched token
    #[error("Unauthenticated.")]
    Unauthenticated,

    /// The client key is locked out after too many failures
    #[error("Too Many Attempts.")]
    RateLimitExceeded,
}

/// Counter store errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Backend could not be reached or refused the operation
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding the store was poisoned by a panicking writer
    #[error("Counter store lock poisoned")]
    Poisoned,
}

/// Audit sink errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuditError {
    /// Sink could not accept the record
    #[error("Audit sink unavailable: {0}")]
    SinkUnavailable(String),
}

/// Application-level error type
///
/// Aggregates the domain-specific error types for the binary and server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Counter store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Audit error
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Token generation error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
