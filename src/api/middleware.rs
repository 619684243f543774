//! API Middleware
//!
//! Session and guest authentication plus request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::SessionStore;
use crate::domain::Identity;
use crate::error::AppError;

use super::AppState;

pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";
pub const GUEST_TOKEN_HEADER: &str = "X-Guest-Token";

// =========================================================================
// Session Authentication Middleware
// =========================================================================

/// Resolve the X-Session-Token header to a registered user and attach the
/// identity to the request.
pub async fn session_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = match headers.get(SESSION_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(token) => token,
        None => return Err(AppError::AuthenticationRequired.into_response()),
    };

    let sessions = SessionStore::new(state.pool.clone());
    let user = match sessions.find_user(token).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AppError::InvalidSession.into_response()),
        Err(e) => return Err(e.into_response()),
    };

    request.extensions_mut().insert(Identity::Registered(user));

    Ok(next.run(request).await)
}

// =========================================================================
// Guest Authentication Middleware
// =========================================================================

/// Resolve the X-Guest-Token header to a guest identity and attach it to the
/// request.
pub async fn guest_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = match headers.get(GUEST_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(token) => token,
        None => return Err(AppError::AuthenticationRequired.into_response()),
    };

    let sessions = SessionStore::new(state.pool.clone());
    let guest = match sessions.find_guest(token).await {
        Ok(Some(guest)) => guest,
        Ok(None) => return Err(AppError::GuestAccessDenied.into_response()),
        Err(e) => return Err(e.into_response()),
    };

    request.extensions_mut().insert(Identity::Guest(guest));

    Ok(next.run(request).await)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "x-session-token",
    "x-guest-token",
    "authorization",
    "cookie",
    "set-cookie",
];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let headers = mask_headers_for_logging(request.headers());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-session-token", "secret-token-12345".parse().unwrap());
        headers.insert("x-guest-token", "guest-token-67890".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let session = masked.iter().find(|(k, _)| k == "x-session-token");
        let guest = masked.iter().find(|(k, _)| k == "x-guest-token");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");

        assert_eq!(session.unwrap().1, "[REDACTED]");
        assert_eq!(guest.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
    }

    #[test]
    fn test_sensitive_headers_list() {
        assert!(SENSITIVE_HEADERS.contains(&"x-session-token"));
        assert!(SENSITIVE_HEADERS.contains(&"x-guest-token"));
        assert!(SENSITIVE_HEADERS.contains(&"authorization"));
        assert!(!SENSITIVE_HEADERS.contains(&"content-type"));
    }
}
