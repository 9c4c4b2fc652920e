//! Per-client rate limiting backed by Redis counters.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::AppState;
use crate::config::{
    RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS, RATE_LIMIT_REQUESTS,
    RATE_LIMIT_WINDOW_SECONDS,
};

/// A fixed window applied to one group of routes
#[derive(Debug, Clone, Copy)]
struct Limit {
    scope: &'static str,
    max_requests: u64,
    window_seconds: u64,
}

const GENERAL: Limit = Limit {
    scope: "general",
    max_requests: RATE_LIMIT_REQUESTS,
    window_seconds: RATE_LIMIT_WINDOW_SECONDS,
};

/// Login, signup and the OTP/reset flows are brute-force targets.
const AUTH: Limit = Limit {
    scope: "auth",
    max_requests: RATE_LIMIT_AUTH_REQUESTS,
    window_seconds: RATE_LIMIT_AUTH_WINDOW_SECONDS,
};

/// Rate limit error response
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));

        (
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            "Too many requests. Please try again later.",
        )
            .into_response()
    }
}

/// Client identity for counting: the first X-Forwarded-For hop, X-Real-IP,
/// then the peer address.
fn get_client_identifier(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("X-Forwarded-For").and_then(|v| v.split(',').next()) {
        return ip.trim().to_string();
    }
    if let Some(ip) = header("X-Real-IP") {
        return ip.to_string();
    }
    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

async fn enforce(
    state: &AppState,
    limit: Limit,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client_id = get_client_identifier(&request);
    let key = format!("{}:{}", limit.scope, client_id);
    let rejected = RateLimitError {
        retry_after: limit.window_seconds,
    };

    let (count, allowed) = match state
        .rate_limiter
        .check_rate_limit(&key, limit.max_requests, limit.window_seconds)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            // Fail closed: no counter, no request
            tracing::error!(error = %e, scope = limit.scope, "Rate limit check failed, denying request");
            return Err(rejected);
        }
    };

    if !allowed {
        tracing::warn!(client = %client_id, count, scope = limit.scope, "Rate limit exceeded");
        return Err(rejected);
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.max_requests));
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from(limit.max_requests.saturating_sub(count)),
    );

    Ok(response)
}

/// General limit for authenticated API routes.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(&state, GENERAL, request, next).await
}

/// Stricter limit for the `/auth` routes.
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(&state, AUTH, request, next).await
}
