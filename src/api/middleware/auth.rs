//! JWT authentication middleware.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::api::AppState;
use crate::config::{BEARER_TOKEN_PREFIX, SESSION_COOKIE_NAME};
use crate::domain::UserRole;
use crate::errors::AppError;

/// Authenticated user extracted from JWT token
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub name: String,
}

impl CurrentUser {
    /// Check if user has admin role.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Name stored on the user's chat messages
    pub fn display_name(&self) -> Option<String> {
        Some(self.name.clone()).filter(|n| !n.trim().is_empty())
    }
}

/// Session token from the Authorization header, or else the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_TOKEN_PREFIX))
    {
        return Some(token.trim().to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// JWT authentication middleware.
///
/// Validates the session token, then injects the CurrentUser into the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let claims = state.services.auth().authenticate(&token).await?;

    let current_user = CurrentUser {
        id: claims.sub,
        email: claims.email,
        role: UserRole::from(claims.role.as_str()),
        name: claims.name,
    };

    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

/// Admin-only gate. Runs after [`auth_middleware`].
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;
    require_admin(user)?;
    Ok(next.run(request).await)
}

/// Require admin role, returns Forbidden error if not admin.
pub fn require_admin(user: &CurrentUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderValue};

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("session_token=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session_token=abc"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_require_admin() {
        let mut user = CurrentUser {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            role: UserRole::Client,
            name: "A".to_string(),
        };
        assert!(matches!(require_admin(&user), Err(AppError::Forbidden)));
        user.role = UserRole::Admin;
        assert!(require_admin(&user).is_ok());
    }
}
