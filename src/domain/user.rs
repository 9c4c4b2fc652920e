//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{ROLE_ADMIN, ROLE_CLIENT, ROLE_USER};
use crate::errors::{AppError, AppResult};

/// User roles enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Client,
    User,
}

impl UserRole {
    /// Check if this role has admin privileges
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => ROLE_ADMIN,
            UserRole::Client => ROLE_CLIENT,
            UserRole::User => ROLE_USER,
        }
    }

    /// Strict parse, for values coming from requests.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            ROLE_ADMIN => Some(UserRole::Admin),
            ROLE_CLIENT => Some(UserRole::Client),
            ROLE_USER => Some(UserRole::User),
            _ => None,
        }
    }
}

/// Lenient conversion for stored values; anything unknown is a client.
impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        Self::parse(s).unwrap_or(UserRole::Client)
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub image: Option<String>,
    pub role: UserRole,
    /// Only meaningful for admins
    pub admin_approved: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Login gate applied after the password has been checked.
    ///
    /// An unverified email is rejected first; an admin account must also
    /// have been approved by another admin.
    pub fn ensure_can_sign_in(&self) -> AppResult<()> {
        if !self.is_email_verified() {
            return Err(AppError::EmailNotVerified);
        }
        if self.is_admin() && !self.admin_approved {
            return Err(AppError::AdminNotApproved);
        }
        Ok(())
    }
}

/// Data needed to insert a user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub admin_approved: bool,
    pub email_verified: bool,
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub image: Option<String>,
    #[schema(example = "client")]
    pub role: String,
    pub admin_approved: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            email_verified: user.is_email_verified(),
            id: user.id,
            name: user.name,
            email: user.email,
            image: user.image,
            role: user.role.to_string(),
            admin_approved: user.admin_approved,
            created_at: user.created_at,
        }
    }
}

/// Canonical form used for lookups and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Counts shown on the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserStats {
    pub total_users: u64,
    pub admin_users: u64,
    pub client_users: u64,
    pub verified_users: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, verified: bool, approved: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            image: None,
            role,
            admin_approved: approved,
            email_verified_at: verified.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("client"), Some(UserRole::Client));
        assert_eq!(UserRole::parse("user"), Some(UserRole::User));
        assert_eq!(UserRole::parse("root"), None);
        assert_eq!(UserRole::from("root"), UserRole::Client);
    }

    #[test]
    fn test_unverified_user_cannot_sign_in() {
        let err = user(UserRole::Client, false, false).ensure_can_sign_in();
        assert!(matches!(err, Err(AppError::EmailNotVerified)));
    }

    #[test]
    fn test_admin_requires_approval() {
        let pending = user(UserRole::Admin, true, false);
        assert!(matches!(
            pending.ensure_can_sign_in(),
            Err(AppError::AdminNotApproved)
        ));
        assert!(user(UserRole::Admin, true, true).ensure_can_sign_in().is_ok());
    }

    #[test]
    fn test_approval_ignored_for_clients() {
        assert!(user(UserRole::Client, true, false).ensure_can_sign_in().is_ok());
    }

    #[test]
    fn test_response_hides_hash() {
        let mut u = user(UserRole::User, true, false);
        u.password_hash = "secret-hash".to_string();
        let json = serde_json::to_string(&UserResponse::from(u)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"email_verified\":true"));
    }
}
