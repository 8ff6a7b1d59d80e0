//! HTTP router for token-gate
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks (no auth)
//! - `/whoami`, guarded without a service scope
//! - `/services/{name}/whoami`, guarded with the `name` service scope

use axum::{
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::TokenGate;
use crate::config::is_valid_service_name;

use super::middleware::{token_auth, AuthenticatedService, GateState};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Identity of the authenticated caller
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WhoAmIResponse {
    /// Service scope the request was authenticated for, if any
    pub service: Option<String>,
}

/// Build the main application router
///
/// # Arguments
///
/// * `gate` - Authentication gate shared by every guarded route
/// * `services` - Service names that get a scoped route; names rejected by
///   [`is_valid_service_name`] are skipped
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router<I, S>(gate: Arc<TokenGate>, services: I) -> Router
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let guarded = Router::new()
        .route("/whoami", get(whoami_handler))
        .route_layer(middleware::from_fn_with_state(
            GateState::new(Arc::clone(&gate)),
            token_auth,
        ));

    let scoped = services
        .into_iter()
        .map(Into::into)
        .filter(|service: &String| {
            let valid = is_valid_service_name(service);
            if !valid {
                tracing::warn!(service = %service, "Skipping route for invalid service name");
            }
            valid
        })
        .fold(Router::new(), |router, service: String| {
            let routes = Router::new()
                .route("/whoami", get(whoami_handler))
                .route_layer(middleware::from_fn_with_state(
                    GateState::for_service(Arc::clone(&gate), service.as_str()),
                    token_auth,
                ));
            router.nest(&format!("/services/{}", service), routes)
        });

    Router::new()
        // Health endpoint (no auth required)
        .route("/health", get(health_handler))
        .merge(guarded)
        .merge(scoped)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn whoami_handler(
    service: Option<Extension<AuthenticatedService>>,
) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        service: service.map(|Extension(AuthenticatedService(name))| name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{GateSettings, TokenSet, TracingAuditSink};
    use crate::server::middleware::ErrorBody;
    use crate::store::MemoryCounterStore;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    fn create_test_gate() -> Arc<TokenGate> {
        let settings = GateSettings {
            tokens: TokenSet::new()
                .with_service("billing", "tok-billing")
                .with_fallback("tok-fb"),
            log_failed_attempts: true,
            ..Default::default()
        };
        Arc::new(TokenGate::new(
            settings,
            Arc::new(MemoryCounterStore::new()),
            Arc::new(TracingAuditSink),
        ))
    }

    fn create_test_server() -> TestServer {
        let app = build_router(create_test_gate(), ["billing", "reports"]);
        TestServer::new(app).unwrap()
    }

    // Test 1: Health endpoint returns OK without a token
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let server = create_test_server();

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert!(!body.version.is_empty());
    }

    // Test 2: Unscoped route reports no service
    #[tokio::test]
    async fn test_whoami_unscoped() {
        let server = create_test_server();

        let response = server
            .get("/whoami")
            .add_header("authorization", "Bearer tok-billing")
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<WhoAmIResponse>(),
            WhoAmIResponse { service: None }
        );
    }

    // Test 3: Scoped route reports the service
    #[tokio::test]
    async fn test_whoami_scoped() {
        let server = create_test_server();

        let response = server
            .get("/services/billing/whoami")
            .add_header("x-api-token", "tok-billing")
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<WhoAmIResponse>(),
            WhoAmIResponse {
                service: Some("billing".to_string())
            }
        );
    }

    // Test 4: Route for a service without a token is never accessible
    #[tokio::test]
    async fn test_unconfigured_service_route() {
        let server = create_test_server();

        for token in ["tok-fb", "tok-billing"] {
            let response = server
                .get("/services/reports/whoami")
                .add_header("authorization", format!("Bearer {}", token))
                .await;
            response.assert_status(StatusCode::UNAUTHORIZED);
            let body: ErrorBody = response.json();
            assert_eq!(body.message, "Unauthenticated.");
        }
    }

    // Test 5: Guarded route without a token is rejected
    #[tokio::test]
    async fn test_whoami_requires_token() {
        let server = create_test_server();
        server
            .get("/whoami")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 6: Lockout is tracked per client address
    #[tokio::test]
    async fn test_lockout_is_per_client() {
        use axum::body::Body;
        use axum::extract::ConnectInfo;
        use axum::http::Request;
        use std::net::SocketAddr;
        use tower::ServiceExt;

        let settings = GateSettings {
            tokens: TokenSet::new().with_fallback("tok-fb"),
            rate_limit: crate::auth::RateLimitConfig {
                max_attempts: 1,
                ..Default::default()
            },
            log_failed_attempts: false,
        };
        let gate = Arc::new(TokenGate::new(
            settings,
            Arc::new(MemoryCounterStore::new()),
            Arc::new(TracingAuditSink),
        ));
        let app = build_router(gate, Vec::<String>::new());

        let request = |peer: &str, token: &str| {
            let peer: SocketAddr = peer.parse().unwrap();
            let mut request = Request::builder()
                .uri("/whoami")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap();
            request.extensions_mut().insert(ConnectInfo(peer));
            request
        };

        let response = app
            .clone()
            .oneshot(request("10.0.0.1:5000", "wrong"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(request("10.0.0.1:5001", "tok-fb"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = app
            .oneshot(request("10.0.0.2:5000", "tok-fb"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Test 7: Invalid service names get no route instead of a startup panic
    #[tokio::test]
    async fn test_invalid_service_names_skipped() {
        let app = build_router(create_test_gate(), ["*all", ":id", "", "a/b", "billing"]);
        let server = TestServer::new(app).unwrap();

        server
            .get("/services/billing/whoami")
            .add_header("authorization", "Bearer tok-billing")
            .await
            .assert_status_ok();
    }
}
