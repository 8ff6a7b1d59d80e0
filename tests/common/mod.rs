//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use token_gate::auth::audit::AuditFields;
use token_gate::auth::{AuditSink, GateSettings, RateLimitConfig, TokenGate, TokenSet};
use token_gate::error::AuditError;
use token_gate::server::build_router;
use token_gate::store::MemoryCounterStore;

pub const BILLING_TOKEN: &str = "billing-secret-0123456789abcdef";
pub const REPORTS_TOKEN: &str = "reports-secret-0123456789abcdef";
pub const FALLBACK_TOKEN: &str = "fallback-secret-0123456789abcdef";

/// One captured audit record
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

/// Audit sink that keeps every record in memory
#[derive(Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl AuditSink for RecordingAuditSink {
    fn warn(&self, message: &str, fields: &AuditFields) -> Result<(), AuditError> {
        self.records.lock().unwrap().push(AuditRecord {
            message: message.to_string(),
            fields: fields.clone(),
        });
        Ok(())
    }
}

/// Gate settings with two service tokens and a fallback token
pub fn test_settings(max_attempts: u32) -> GateSettings {
    GateSettings {
        tokens: TokenSet::new()
            .with_service("billing", BILLING_TOKEN)
            .with_service("reports", REPORTS_TOKEN)
            .with_fallback(FALLBACK_TOKEN),
        rate_limit: RateLimitConfig {
            max_attempts,
            lockout_duration: Duration::from_secs(60),
            ..Default::default()
        },
        log_failed_attempts: true,
    }
}

/// A running test server
pub struct TestApp {
    pub addr: SocketAddr,
    pub gate: Arc<TokenGate>,
    pub audit: Arc<RecordingAuditSink>,
    pub client: reqwest::Client,
    _shutdown: tokio::sync::oneshot::Sender<()>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// GET `path` with an `Authorization: Bearer` header
    pub async fn get_bearer(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Request failed")
    }
}

/// Run a test server in the background
///
/// The server keeps running until the returned [`TestApp`] is dropped. Peer
/// addresses are attached so the gate sees the real client IP.
pub async fn spawn_app(settings: GateSettings) -> TestApp {
    use tokio::net::TcpListener;

    let audit = Arc::new(RecordingAuditSink::default());
    let gate = Arc::new(TokenGate::new(
        settings,
        Arc::new(MemoryCounterStore::new()),
        Arc::clone(&audit) as Arc<dyn AuditSink>,
    ));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = build_router(Arc::clone(&gate), ["billing", "reports"])
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .into_make_service_with_connect_info::<SocketAddr>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    TestApp {
        addr,
        gate,
        audit,
        client: reqwest::Client::new(),
        _shutdown: shutdown_tx,
    }
}
