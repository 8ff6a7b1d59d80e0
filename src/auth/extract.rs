//! Credential extraction from request headers
//!
//! Two sources are consulted, in order: an `Authorization: Bearer <token>`
//! header, then a single `X-API-Token: <token>` header. Anything malformed is
//! reported as "no token", the same as a missing header.

use axum::http::{header, HeaderMap, HeaderValue};

/// Dedicated single-value token header
pub const API_TOKEN_HEADER: &str = "x-api-token";

const BEARER_SCHEME: &str = "bearer";

/// Pull the candidate token out of `headers`
///
/// Returns `None` when no usable token is present. Never panics on hostile
/// input: non-UTF-8 values, missing values after the scheme and values with
/// embedded whitespace all yield `None` for that source.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| api_token_header(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = single_value(headers, header::AUTHORIZATION.as_str())?;
    let (scheme, rest) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    well_formed(rest)
}

fn api_token_header(headers: &HeaderMap) -> Option<&str> {
    let value = single_value(headers, API_TOKEN_HEADER)?;
    well_formed(value)
}

fn single_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let mut values = headers.get_all(name).iter();
    let first: &HeaderValue = values.next()?;
    if values.next().is_some() {
        return None;
    }
    first.to_str().ok()
}

fn well_formed(raw: &str) -> Option<&str> {
    let token = raw.trim();
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return None;
    }
    Some(token)
}
