//! Authentication service: signup, login, email verification and password reset.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{Config, OTP_EXPIRATION_MINUTES, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER};
use crate::domain::token::{generate_otp, generate_reset_token, is_valid_otp_format};
use crate::domain::{normalize_email, NewUser, Password, TokenPurpose, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{Mailer, SessionStore, UnitOfWork};
use crate::utils::templates;
use crate::with_transaction;

const INVALID_RESET_LINK: &str = "Invalid or expired reset link";

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 2592000)]
    pub expires_in: i64,
}

/// A successful login
#[derive(Debug, Clone)]
pub struct SignIn {
    pub token: TokenResponse,
    pub user: User,
}

/// Signup request after extraction
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<UserRole>,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an account and email a verification code.
    async fn register(&self, registration: Registration) -> AppResult<User>;

    /// Check credentials and the sign-in gates, then issue a token.
    ///
    /// `portal` is the role of the login page used; a mismatch is rejected.
    async fn login(
        &self,
        email: String,
        password: String,
        portal: Option<UserRole>,
    ) -> AppResult<SignIn>;

    /// Verify signature and expiry only.
    fn verify_token(&self, token: &str) -> AppResult<Claims>;

    /// Verify a token and reject it if the user's sessions were revoked after it was issued.
    async fn authenticate(&self, token: &str) -> AppResult<Claims>;

    async fn verify_otp(&self, email: String, code: String) -> AppResult<()>;

    async fn resend_otp(&self, email: String) -> AppResult<()>;

    /// Email a reset link if the account exists.
    ///
    /// Returns the link itself only in development.
    async fn forgot_password(&self, email: String) -> AppResult<Option<String>>;

    async fn reset_password(&self, email: String, token: String, password: String)
        -> AppResult<()>;

    /// Role of the account, `client` when unknown.
    async fn role_for_email(&self, email: String) -> AppResult<UserRole>;
}

/// Generate a JWT for a user
fn generate_token(user: &User, config: &Config) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        name: user.name.clone(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

fn verify_token_internal(token: &str, config: &Config) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    sessions: Arc<dyn SessionStore>,
    mailer: Arc<dyn Mailer>,
    config: Config,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(
        uow: Arc<U>,
        sessions: Arc<dyn SessionStore>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        Self {
            uow,
            sessions,
            mailer,
            config,
        }
    }

    /// Issue a fresh code, superseding older ones, and mail it.
    async fn send_otp(&self, user: &User) -> AppResult<()> {
        let code = generate_otp();
        let hash = Password::hash_secret(&code)?.into_string();
        let purpose = TokenPurpose::EmailOtp;

        self.uow
            .tokens()
            .issue(&user.email, purpose, hash, Utc::now() + purpose.lifetime())
            .await?;

        self.mailer
            .send(templates::otp_email(
                &user.email,
                &user.name,
                &code,
                OTP_EXPIRATION_MINUTES,
            ))
            .await?;

        tracing::info!(user_id = %user.id, "Verification code sent");
        Ok(())
    }

    fn reset_url(&self, token: &str, email: &str) -> AppResult<String> {
        let base = format!(
            "{}/reset-password",
            self.config.app_base_url.trim_end_matches('/')
        );
        let url = reqwest::Url::parse_with_params(&base, &[("token", token), ("email", email)])
            .map_err(|e| AppError::internal(format!("Invalid APP_BASE_URL: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn register(&self, registration: Registration) -> AppResult<User> {
        let role = registration.role.unwrap_or(UserRole::Client);
        if role == UserRole::User {
            return Err(AppError::bad_request("Role must be client or admin"));
        }

        let email = normalize_email(&registration.email);
        if self.uow.users().find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("User"));
        }

        let password_hash = Password::new(&registration.password)?.into_string();
        let user = self
            .uow
            .users()
            .create(NewUser {
                name: registration.name.trim().to_string(),
                email,
                password_hash,
                role,
                admin_approved: false,
                email_verified: false,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        if let Err(e) = self.send_otp(&user).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send verification code");
        }

        Ok(user)
    }

    async fn login(
        &self,
        email: String,
        password: String,
        portal: Option<UserRole>,
    ) -> AppResult<SignIn> {
        let email = normalize_email(&email);

        // Verify against a dummy hash when the user is unknown so both paths cost the same
        let user = match self.uow.users().find_by_email(&email).await? {
            Some(user) if Password::from_hash(user.password_hash.clone()).verify(&password) => {
                user
            }
            Some(_) => return Err(AppError::InvalidCredentials),
            None => {
                Password::verify_dummy(&password);
                return Err(AppError::InvalidCredentials);
            }
        };

        if portal.is_some_and(|role| role != user.role) {
            tracing::debug!(user_id = %user.id, "Login through the wrong portal");
            return Err(AppError::Forbidden);
        }

        user.ensure_can_sign_in()?;

        let token = generate_token(&user, &self.config)?;
        tracing::info!(user_id = %user.id, "User signed in");

        Ok(SignIn { token, user })
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        verify_token_internal(token, &self.config)
    }

    async fn authenticate(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if let Some(revoked_at) = self.sessions.revoked_at(claims.sub).await? {
            if claims.iat < revoked_at {
                tracing::debug!(user_id = %claims.sub, "Rejected revoked session");
                return Err(AppError::Unauthorized);
            }
        }

        Ok(claims)
    }

    async fn verify_otp(&self, email: String, code: String) -> AppResult<()> {
        if !is_valid_otp_format(&code) {
            return Err(AppError::bad_request("Verification code must be 6 digits"));
        }

        let email = normalize_email(&email);
        let user = self
            .uow
            .users()
            .find_by_email(&email)
            .await?
            .ok_or(AppError::NotFound)?;

        if user.is_email_verified() {
            return Err(AppError::bad_request("Email is already verified"));
        }

        let token = self
            .uow
            .tokens()
            .latest(&email, TokenPurpose::EmailOtp)
            .await?
            .ok_or_else(|| {
                AppError::bad_request("No verification code found. Please request a new one.")
            })?;

        if token.is_expired_at(Utc::now()) {
            return Err(AppError::bad_request(
                "Verification code has expired. Please request a new one.",
            ));
        }

        if !Password::from_hash(token.token_hash).verify(&code) {
            return Err(AppError::bad_request("Invalid verification code"));
        }

        let user_id = user.id;
        with_transaction!(self.uow, |ctx| {
            ctx.users().mark_email_verified(user_id).await?;
            ctx.tokens()
                .delete_all(&email, TokenPurpose::EmailOtp)
                .await?;
            Ok(())
        })?;

        tracing::info!(user_id = %user_id, "Email verified");
        Ok(())
    }

    async fn resend_otp(&self, email: String) -> AppResult<()> {
        let email = normalize_email(&email);
        let user = self
            .uow
            .users()
            .find_by_email(&email)
            .await?
            .ok_or(AppError::NotFound)?;

        if user.is_email_verified() {
            return Err(AppError::bad_request("Email is already verified"));
        }

        self.send_otp(&user).await
    }

    async fn forgot_password(&self, email: String) -> AppResult<Option<String>> {
        let email = normalize_email(&email);
        let Some(user) = self.uow.users().find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_reset_token();
        let hash = Password::hash_secret(&token)?.into_string();
        let purpose = TokenPurpose::PasswordReset;

        self.uow
            .tokens()
            .issue(&email, purpose, hash, Utc::now() + purpose.lifetime())
            .await?;

        let url = self.reset_url(&token, &email)?;
        self.mailer
            .send(templates::password_reset_email(&email, &url))
            .await?;

        tracing::info!(user_id = %user.id, "Password reset link issued");

        Ok(self.config.is_development().then_some(url))
    }

    async fn reset_password(
        &self,
        email: String,
        token: String,
        password: String,
    ) -> AppResult<()> {
        let password_hash = Password::new(&password)?.into_string();
        let email = normalize_email(&email);

        let stored = self
            .uow
            .tokens()
            .latest(&email, TokenPurpose::PasswordReset)
            .await?
            .ok_or_else(|| AppError::bad_request(INVALID_RESET_LINK))?;

        if stored.is_expired_at(Utc::now()) || !Password::from_hash(stored.token_hash).verify(&token)
        {
            return Err(AppError::bad_request(INVALID_RESET_LINK));
        }

        let user_id = with_transaction!(serializable self.uow, |ctx| {
            let user = ctx
                .users()
                .find_by_email(&email)
                .await?
                .ok_or_else(|| AppError::bad_request(INVALID_RESET_LINK))?;
            ctx.users().update_password(user.id, password_hash).await?;
            ctx.tokens()
                .delete_all(&email, TokenPurpose::PasswordReset)
                .await?;
            Ok(user.id)
        })?;

        self.sessions
            .revoke_user_sessions(user_id, self.config.session_ttl_seconds())
            .await?;

        tracing::info!(user_id = %user_id, "Password reset");
        Ok(())
    }

    async fn role_for_email(&self, email: String) -> AppResult<UserRole> {
        let user = self
            .uow
            .users()
            .find_by_email(&normalize_email(&email))
            .await?;
        Ok(user.map_or(UserRole::Client, |u| u.role))
    }
}
