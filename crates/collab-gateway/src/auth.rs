//! Bearer-token auth gate for every `/api/*` route. This is the full
//! extent of the identity/authorization layer this crate implements.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::app::AppState;

/// Tower middleware applied to the whole `/api` nest: rejects any
/// request lacking a matching `Authorization: Bearer <token>` header.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if check_auth(&state, &headers) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

pub fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    match &state.config.gateway.auth_token {
        None => true,
        Some(expected) => extract_bearer(headers)
            .map(|token| token == expected)
            .unwrap_or(false),
    }
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_has_no_bearer() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn strips_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret-token"));
        assert_eq!(extract_bearer(&headers), Some("secret-token"));
    }
}
