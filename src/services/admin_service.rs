//! Admin console operations on user accounts.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{normalize_email, NewUser, Password, User, UserRole, UserStats};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{SessionStore, UnitOfWork};
use crate::types::{Paginated, PaginationParams};

#[async_trait]
pub trait AdminService: Send + Sync {
    /// Newest accounts first
    async fn list_users(&self, params: PaginationParams) -> AppResult<Paginated<User>>;

    async fn approve_admin(&self, id: Uuid) -> AppResult<User>;

    /// Hard delete. `actor` is the admin performing it and may not target itself.
    async fn delete_user(&self, actor: Uuid, id: Uuid) -> AppResult<()>;

    /// Set a new role and sign the user out everywhere.
    async fn change_role(&self, id: Uuid, role: String) -> AppResult<User>;

    async fn stats(&self) -> AppResult<UserStats>;
}

pub struct AdminManager<U: UnitOfWork> {
    uow: Arc<U>,
    sessions: Arc<dyn SessionStore>,
    config: Config,
}

impl<U: UnitOfWork> AdminManager<U> {
    pub fn new(uow: Arc<U>, sessions: Arc<dyn SessionStore>, config: Config) -> Self {
        Self {
            uow,
            sessions,
            config,
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> AdminService for AdminManager<U> {
    async fn list_users(&self, params: PaginationParams) -> AppResult<Paginated<User>> {
        let limit = params.limit();
        let (users, total) = self.uow.users().list(params.offset(), limit).await?;
        Ok(Paginated::new(users, params.page, limit, total))
    }

    async fn approve_admin(&self, id: Uuid) -> AppResult<User> {
        let user = self
            .uow
            .users()
            .find_by_id(id)
            .await?
            .ok_or_not_found()?;

        if !user.is_admin() {
            return Err(AppError::bad_request("Only admin accounts need approval"));
        }
        if user.admin_approved {
            return Err(AppError::bad_request("Admin is already approved"));
        }

        let user = self.uow.users().approve(id).await?;
        tracing::info!(user_id = %id, "Admin approved");
        Ok(user)
    }

    async fn delete_user(&self, actor: Uuid, id: Uuid) -> AppResult<()> {
        if actor == id {
            return Err(AppError::bad_request("You cannot delete your own account"));
        }

        self.uow.users().delete(id).await?;
        tracing::info!(user_id = %id, actor = %actor, "User deleted");
        Ok(())
    }

    async fn change_role(&self, id: Uuid, role: String) -> AppResult<User> {
        let role = UserRole::parse(role.trim())
            .ok_or_else(|| AppError::bad_request("Role must be admin, client or user"))?;

        if self.uow.users().find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let user = self.uow.users().update_role(id, role).await?;
        self.sessions
            .revoke_user_sessions(id, self.config.session_ttl_seconds())
            .await?;

        tracing::info!(user_id = %id, role = %role, "Role changed");
        Ok(user)
    }

    async fn stats(&self) -> AppResult<UserStats> {
        self.uow.users().stats().await
    }
}

/// Create an approved, verified admin account. Used by the CLI.
pub async fn provision_admin<U: UnitOfWork>(
    uow: &U,
    name: &str,
    email: &str,
    password: &str,
) -> AppResult<User> {
    let email = normalize_email(email);
    if uow.users().find_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("User"));
    }

    let password_hash = Password::new(password)?.into_string();
    let user = uow
        .users()
        .create(NewUser {
            name: name.trim().to_string(),
            email,
            password_hash,
            role: UserRole::Admin,
            admin_approved: true,
            email_verified: true,
        })
        .await?;

    tracing::info!(user_id = %user.id, "Admin account provisioned");
    Ok(user)
}
