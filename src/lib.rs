//! token-gate - Static shared-secret token authentication for HTTP services
//!
//! This crate provides an axum middleware that guards routes with pre-shared
//! bearer tokens, optionally scoped per service, and locks out clients after
//! repeated failed attempts.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod telemetry;
