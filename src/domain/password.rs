//! Password and secret hashing.
//!
//! Account passwords and emailed one-time secrets (OTP codes, reset tokens)
//! are both stored as Argon2 PHC strings, never in plain text.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

use crate::config::MIN_PASSWORD_LENGTH;
use crate::errors::{AppError, AppResult};

/// Hash verified against when a login names an unknown account, so the
/// response time does not reveal whether the email exists.
static DUMMY_PASSWORD: Lazy<Option<Password>> =
    Lazy::new(|| Password::hash_secret("treechat-timing-equalizer").ok());

/// Hashed password value object.
#[derive(Clone)]
pub struct Password {
    hash: String,
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

impl Password {
    /// Hash a new account password.
    ///
    /// # Errors
    /// Returns a validation error if the password is shorter than
    /// `MIN_PASSWORD_LENGTH` characters.
    pub fn new(plain_text: &str) -> AppResult<Self> {
        if plain_text.chars().count() < MIN_PASSWORD_LENGTH as usize {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        Self::hash_secret(plain_text)
    }

    /// Hash an arbitrary secret without the password length policy.
    /// Used for OTP codes and reset tokens.
    pub fn hash_secret(secret: &str) -> AppResult<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Password hash failed: {}", e)))?;
        Ok(Self {
            hash: hash.to_string(),
        })
    }

    /// Wrap an existing hash loaded from the database.
    pub fn from_hash(hash: String) -> Self {
        Self { hash }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    pub fn into_string(self) -> String {
        self.hash
    }

    /// Verify a plain text secret against this hash.
    /// A malformed stored hash never verifies.
    pub fn verify(&self, plain_text: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(plain_text.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored hash is not a valid PHC string");
                false
            }
        }
    }

    /// Spend the same work as a real verification and always fail.
    pub fn verify_dummy(plain_text: &str) -> bool {
        if let Some(dummy) = DUMMY_PASSWORD.as_ref() {
            let _ = dummy.verify(plain_text);
        }
        false
    }
}

impl From<Password> for String {
    fn from(password: Password) -> Self {
        password.hash
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Password {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let password = Password::new("SecurePassword123!").unwrap();

        assert!(password.verify("SecurePassword123!"));
        assert!(!password.verify("WrongPassword123"));
    }

    #[test]
    fn test_password_from_hash() {
        let hash = Password::new("TestPassword123").unwrap().into_string();
        assert!(Password::from_hash(hash).verify("TestPassword123"));
    }

    #[test]
    fn test_same_password_different_salts() {
        let pass1 = Password::new("SamePassword123").unwrap();
        let pass2 = Password::new("SamePassword123").unwrap();

        assert_ne!(pass1.as_str(), pass2.as_str());
        assert!(pass1.verify("SamePassword123"));
        assert!(pass2.verify("SamePassword123"));
    }

    #[test]
    fn test_password_length_policy() {
        assert!(Password::new("short").is_err());
        assert!(Password::new("12345678").is_ok());
    }

    #[test]
    fn test_short_secrets_hash_without_policy() {
        let otp = Password::hash_secret("042917").unwrap();
        assert!(otp.verify("042917"));
        assert!(!otp.verify("042918"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let broken = Password::from_hash("not-a-phc-string".to_string());
        assert!(!broken.verify("anything"));
    }

    #[test]
    fn test_dummy_always_fails() {
        assert!(!Password::verify_dummy("treechat-timing-equalizer"));
    }
}
