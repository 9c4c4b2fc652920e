//! Chat session repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

use super::entities::chat_message;
use super::entities::chat_session::{
    self, ActiveModel, Entity as SessionEntity, SessionWithCount,
};
use crate::domain::{ChatSession, SessionSummary};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Chat session storage. Every lookup is scoped to the owning user.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ChatSessionRepository: Send + Sync {
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<ChatSession>>;

    /// Newest activity first, with message counts
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SessionSummary>>;

    /// Session with the latest `updated_at`
    async fn most_recent(&self, user_id: Uuid) -> AppResult<Option<ChatSession>>;

    async fn create(&self, user_id: Uuid, title: String) -> AppResult<ChatSession>;

    async fn rename(&self, id: Uuid, title: String) -> AppResult<ChatSession>;

    /// Bump `updated_at`
    async fn touch(&self, id: Uuid) -> AppResult<()>;

    /// Messages are removed by the cascading foreign key
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64>;
}

/// SeaORM-backed session repository
pub struct ChatSessionStore {
    db: DatabaseConnection,
}

impl ChatSessionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatSessionRepository for ChatSessionStore {
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<ChatSession>> {
        let result = SessionEntity::find_by_id(id)
            .filter(chat_session::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(result.map(ChatSession::from))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SessionSummary>> {
        let rows = SessionEntity::find()
            .select_only()
            .column(chat_session::Column::Id)
            .column(chat_session::Column::UserId)
            .column(chat_session::Column::Title)
            .column(chat_session::Column::CreatedAt)
            .column(chat_session::Column::UpdatedAt)
            .column_as(chat_message::Column::Id.count(), "message_count")
            .join(JoinType::LeftJoin, chat_session::Relation::ChatMessages.def())
            .filter(chat_session::Column::UserId.eq(user_id))
            .group_by(chat_session::Column::Id)
            .order_by_desc(chat_session::Column::UpdatedAt)
            .into_model::<SessionWithCount>()
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(SessionSummary::from).collect())
    }

    async fn most_recent(&self, user_id: Uuid) -> AppResult<Option<ChatSession>> {
        let result = SessionEntity::find()
            .filter(chat_session::Column::UserId.eq(user_id))
            .order_by_desc(chat_session::Column::UpdatedAt)
            .one(&self.db)
            .await?;
        Ok(result.map(ChatSession::from))
    }

    async fn create(&self, user_id: Uuid, title: String) -> AppResult<ChatSession> {
        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            title: Set(title),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        tracing::debug!(session_id = %model.id, user_id = %user_id, "Chat session created");
        Ok(ChatSession::from(model))
    }

    async fn rename(&self, id: Uuid, title: String) -> AppResult<ChatSession> {
        let model = SessionEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.title = Set(title);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(ChatSession::from(model))
    }

    async fn touch(&self, id: Uuid) -> AppResult<()> {
        SessionEntity::update_many()
            .col_expr(chat_session::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(chat_session::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = SessionEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let count = SessionEntity::find()
            .filter(chat_session::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}
