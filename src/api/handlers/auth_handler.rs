//! Authentication handlers.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::config::{Config, SESSION_COOKIE_NAME};
use crate::domain::{UserResponse, UserRole};
use crate::errors::{AppError, AppResult};
use crate::services::{Registration, TokenResponse};
use crate::types::MessageResponse;

/// User registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// User display name
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    /// User email address
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    /// User password (minimum 8 characters)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "SecurePass123!", min_length = 8)]
    pub password: String,
    /// `client` (default) or `admin`; admins wait for approval
    #[schema(example = "client")]
    pub role: Option<String>,
}

/// User login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "SecurePass123!")]
    pub password: String,
    /// Portal the user signs in through; must match the account's role
    #[schema(example = "client")]
    pub role: Option<String>,
}

/// Token and profile returned by login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(equal = 6, message = "Verification code must be 6 digits"))]
    #[schema(example = "123456")]
    pub otp_code: String,
}

/// Body of the endpoints that only need an address
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Present only in development
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    #[schema(example = "client")]
    pub role: UserRole,
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent.";

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/role", post(role))
}

fn parse_role(role: Option<&str>) -> AppResult<Option<UserRole>> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => UserRole::parse(r)
            .map(Some)
            .ok_or_else(|| AppError::bad_request("Role must be admin, client or user")),
    }
}

fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token))
        .http_only(true)
        .secure(!config.is_development())
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(config.session_ttl_seconds() as i64))
        .build()
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification code sent", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let role = parse_role(payload.role.as_deref())?;
    let user = state
        .services
        .auth()
        .register(Registration {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Sign in and receive a session token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; also sets the session cookie", body = LoginResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Wrong portal, unverified email or unapproved admin")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let portal = parse_role(payload.role.as_deref())?;
    let sign_in = state
        .services
        .auth()
        .login(payload.email, payload.password, portal)
        .await?;

    let jar = jar.add(session_cookie(
        sign_in.token.access_token.clone(),
        &state.config,
    ));

    Ok((
        jar,
        Json(LoginResponse {
            token: sign_in.token,
            user: UserResponse::from(sign_in.user),
        }),
    ))
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Authentication",
    responses((status = 200, description = "Signed out", body = MessageResponse))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"));
    (jar, Json(MessageResponse::new("Signed out")))
}

/// Verify an email address with the emailed code
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "Authentication",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid, expired or missing code, or already verified"),
        (status = 404, description = "No account with that email")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<VerifyOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .auth()
        .verify_otp(payload.email, payload.otp_code)
        .await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Send a fresh verification code
#[utoipa::path(
    post,
    path = "/auth/resend-otp",
    tag = "Authentication",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Already verified"),
        (status = 404, description = "No account with that email")
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.auth().resend_otp(payload.email).await?;
    Ok(Json(MessageResponse::new("A new verification code has been sent")))
}

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Authentication",
    request_body = EmailRequest,
    responses((status = 200, description = "Same answer whether or not the account exists", body = ForgotPasswordResponse))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    let reset_url = state.services.auth().forgot_password(payload.email).await?;
    Ok(Json(ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE.to_string(),
        reset_url,
    }))
}

/// Set a new password with an emailed reset token
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated; existing sessions revoked", body = MessageResponse),
        (status = 400, description = "Invalid or expired reset link")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .auth()
        .reset_password(payload.email, payload.token, payload.password)
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// Role of an account, used to pick the login portal
#[utoipa::path(
    post,
    path = "/auth/role",
    tag = "Authentication",
    request_body = EmailRequest,
    responses((status = 200, description = "Role, `client` for unknown accounts", body = RoleResponse))
)]
pub async fn role(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Json<RoleResponse>> {
    let role = state.services.auth().role_for_email(payload.email).await?;
    Ok(Json(RoleResponse { role }))
}
