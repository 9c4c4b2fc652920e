//! User self-service: profile and password.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{normalize_email, Password, User};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// Replace name and email. The email must not belong to another account.
    async fn update_profile(&self, id: Uuid, name: String, email: String) -> AppResult<User>;

    async fn change_password(
        &self,
        id: Uuid,
        current_password: String,
        new_password: String,
    ) -> AppResult<()>;
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(id)
            .await?
            .ok_or_not_found()
    }

    async fn update_profile(&self, id: Uuid, name: String, email: String) -> AppResult<User> {
        let name = name.trim().to_string();
        let email = normalize_email(&email);
        if name.is_empty() || email.is_empty() {
            return Err(AppError::bad_request("Name and email are required"));
        }

        if let Some(existing) = self.uow.users().find_by_email(&email).await? {
            if existing.id != id {
                return Err(AppError::conflict("Email"));
            }
        }

        let user = self.uow.users().update_profile(id, name, email).await?;
        tracing::info!(user_id = %id, "Profile updated");
        Ok(user)
    }

    async fn change_password(
        &self,
        id: Uuid,
        current_password: String,
        new_password: String,
    ) -> AppResult<()> {
        let user = self.get_user(id).await?;

        if !Password::from_hash(user.password_hash).verify(&current_password) {
            return Err(AppError::bad_request("Current password is incorrect"));
        }

        let password_hash = Password::new(&new_password)?.into_string();
        self.uow.users().update_password(id, password_hash).await?;

        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }
}
