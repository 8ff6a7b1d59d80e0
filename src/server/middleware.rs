//! HTTP middleware for token-gate
//!
//! This module provides middleware for:
//! - Token authentication, optionally scoped to a named service
//! - Request/response logging

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AuthRequest, ClientIdentity, TokenGate};
use crate::error::AuthError;

/// State for one application of the authentication middleware
///
/// Each guarded route group gets its own state carrying its service scope.
#[derive(Clone)]
pub struct GateState {
    gate: Arc<TokenGate>,
    service: Option<Arc<str>>,
}

impl GateState {
    /// Guard without a service scope (any configured token is accepted)
    pub fn new(gate: Arc<TokenGate>) -> Self {
        Self {
            gate,
            service: None,
        }
    }

    /// Guard scoped to `service` (only that service's token is accepted)
    pub fn for_service(gate: Arc<TokenGate>, service: impl Into<Arc<str>>) -> Self {
        Self {
            gate,
            service: Some(service.into()),
        }
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }
}

/// Authenticated service extension for requests
///
/// The request-scoped `authenticated_service` value: inserted only when the
/// guard was scoped to a service and the token matched it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedService(pub String);

/// Authentication middleware function
///
/// This middleware:
/// 1. Derives the client identity from the peer address
/// 2. Runs the gate (lockout check, token validation, limiter update)
/// 3. Adds the authenticated service to the request extensions
pub async fn token_auth(
    State(state): State<GateState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthResponse> {
    let identity = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| ClientIdentity::from(addr.ip()))
        .unwrap_or(ClientIdentity::Unknown);
    let url = full_url(&request);

    let decision = {
        let auth_request = AuthRequest {
            headers: request.headers(),
            identity,
            url: &url,
        };
        state
            .gate
            .authenticate(&auth_request, state.service())
            .await
            .map_err(AuthResponse::from)?
    };

    if let Some(service) = decision.matched_service {
        request
            .extensions_mut()
            .insert(AuthenticatedService(service));
    }

    Ok(next.run(request).await)
}

/// Reconstruct the request URL as the client addressed it
fn full_url(request: &Request) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    match request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
    {
        Some(host) => format!("http://{}{}", host, path),
        None => path.to_string(),
    }
}

/// JSON body of every authentication failure
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
}

/// Authentication error response
#[derive(Debug)]
pub struct AuthResponse {
    status: StatusCode,
    message: &'static str,
}

impl From<AuthError> for AuthResponse {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthenticated => Self {
                status: StatusCode::UNAUTHORIZED,
                message: "Unauthenticated.",
            },
            AuthError::RateLimitExceeded => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "Too Many Attempts.",
            },
        }
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Logging middleware function
///
/// Logs request and response details including:
/// - Method and path
/// - Status code
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}
