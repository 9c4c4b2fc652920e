//! Email verification codes and password reset tokens.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rand::{Rng, RngCore};
use regex::Regex;
use uuid::Uuid;

use crate::config::{
    OTP_EXPIRATION_MINUTES, OTP_LENGTH, RESET_TOKEN_BYTES, RESET_TOKEN_EXPIRATION_MINUTES,
};

static OTP_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\d{{{}}}$", OTP_LENGTH)).expect("OTP pattern is a valid regex")
});

/// What a stored token may be redeemed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    EmailOtp,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailOtp => "email_otp",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    /// How long a freshly issued token stays valid.
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenPurpose::EmailOtp => Duration::minutes(OTP_EXPIRATION_MINUTES),
            TokenPurpose::PasswordReset => Duration::minutes(RESET_TOKEN_EXPIRATION_MINUTES),
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored verification token. Only the hash of the secret is kept.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub id: Uuid,
    pub identifier: String,
    pub purpose: TokenPurpose,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Random zero-padded numeric code.
pub fn generate_otp() -> String {
    let upper = 10u32.pow(OTP_LENGTH as u32);
    let code = rand::thread_rng().gen_range(0..upper);
    format!("{:0width$}", code, width = OTP_LENGTH)
}

/// Random hex-encoded reset token.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn is_valid_otp_format(code: &str) -> bool {
    OTP_FORMAT.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_otp_matches_format() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(is_valid_otp_format(&otp), "bad otp {otp}");
        }
    }

    #[test]
    fn test_otp_format_rejects_garbage() {
        assert!(!is_valid_otp_format("12345"));
        assert!(!is_valid_otp_format("1234567"));
        assert!(!is_valid_otp_format("12a456"));
        assert!(!is_valid_otp_format(" 123456"));
    }

    #[test]
    fn test_reset_token_is_64_hex_chars() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_reset_token());
    }

    #[test]
    fn test_lifetimes() {
        assert_eq!(TokenPurpose::EmailOtp.lifetime(), Duration::minutes(10));
        assert_eq!(TokenPurpose::PasswordReset.lifetime(), Duration::hours(1));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let token = VerificationToken {
            id: Uuid::new_v4(),
            identifier: "a@example.com".to_string(),
            purpose: TokenPurpose::EmailOtp,
            token_hash: String::new(),
            expires_at: now,
            created_at: now,
        };
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::seconds(1)));
    }
}
