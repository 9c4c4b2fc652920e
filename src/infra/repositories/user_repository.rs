//! User repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::{NewUser, User, UserRole, UserStats};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Account storage.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Replace name and email
    async fn update_profile(&self, id: Uuid, name: String, email: String) -> AppResult<User>;

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()>;

    async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<User>;

    async fn approve(&self, id: Uuid) -> AppResult<User>;

    async fn mark_email_verified(&self, id: Uuid) -> AppResult<()>;

    /// Hard delete; sessions and messages go with it
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Newest first, returns the page and the total count
    async fn list(&self, offset: u64, limit: u64) -> AppResult<(Vec<User>, u64)>;

    async fn stats(&self) -> AppResult<UserStats>;
}

/// SeaORM-backed user repository
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) async fn find_by_email_in<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> AppResult<Option<User>> {
    let result = UserEntity::find()
        .filter(user::Column::Email.eq(email))
        .one(conn)
        .await?;
    Ok(result.map(User::from))
}

pub(crate) async fn update_password_in<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    password_hash: String,
) -> AppResult<()> {
    let mut active = load_active(conn, id).await?;
    active.password_hash = Set(password_hash);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(())
}

pub(crate) async fn mark_email_verified_in<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<()> {
    let mut active = load_active(conn, id).await?;
    let now = Utc::now();
    active.email_verified_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(conn).await?;
    Ok(())
}

async fn load_active<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ActiveModel> {
    let model = UserEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(model.into())
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_by_email_in(&self.db, email).await
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let now = Utc::now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(user.name),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            image: Set(None),
            role: Set(user.role.to_string()),
            admin_approved: Set(user.admin_approved),
            email_verified_at: Set(user.email_verified.then_some(now)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await?;
        Ok(User::from(model))
    }

    async fn update_profile(&self, id: Uuid, name: String, email: String) -> AppResult<User> {
        let mut active = load_active(&self.db, id).await?;
        active.name = Set(name);
        active.email = Set(email);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(User::from(model))
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        update_password_in(&self.db, id, password_hash).await
    }

    async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<User> {
        let mut active = load_active(&self.db, id).await?;
        active.role = Set(role.to_string());
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(User::from(model))
    }

    async fn approve(&self, id: Uuid) -> AppResult<User> {
        let mut active = load_active(&self.db, id).await?;
        active.admin_approved = Set(true);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(User::from(model))
    }

    async fn mark_email_verified(&self, id: Uuid) -> AppResult<()> {
        mark_email_verified_in(&self.db, id).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = UserEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    async fn list(&self, offset: u64, limit: u64) -> AppResult<(Vec<User>, u64)> {
        let query = UserEntity::find().order_by_desc(user::Column::CreatedAt);
        let total = query.clone().count(&self.db).await?;

        let models = query.offset(offset).limit(limit).all(&self.db).await?;

        Ok((models.into_iter().map(User::from).collect(), total))
    }

    async fn stats(&self) -> AppResult<UserStats> {
        let total_users = UserEntity::find().count(&self.db).await?;
        let admin_users = UserEntity::find()
            .filter(user::Column::Role.eq(UserRole::Admin.as_str()))
            .count(&self.db)
            .await?;
        let client_users = UserEntity::find()
            .filter(user::Column::Role.eq(UserRole::Client.as_str()))
            .count(&self.db)
            .await?;
        let verified_users = UserEntity::find()
            .filter(user::Column::EmailVerifiedAt.is_not_null())
            .count(&self.db)
            .await?;

        Ok(UserStats {
            total_users,
            admin_users,
            client_users,
            verified_users,
        })
    }
}
