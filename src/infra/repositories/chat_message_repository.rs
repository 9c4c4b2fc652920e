//! Chat message repository.
//!
//! Tree mutations run inside a transaction that first takes a row lock on the
//! owning session, so concurrent appends and switches on one session are
//! serialized while other sessions proceed independently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use super::entities::chat_message::{self, ActiveModel, Entity as MessageEntity};
use super::entities::chat_session::{self, Entity as SessionEntity};
use crate::domain::{tree, ChatMessage, NewChatMessage};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const DELETE_SUBTREE_SQL: &str = r#"
WITH RECURSIVE subtree AS (
    SELECT id FROM chat_messages WHERE id = $1
    UNION ALL
    SELECT m.id FROM chat_messages m
    INNER JOIN subtree s ON m.parent_message_id = s.id
)
DELETE FROM chat_messages WHERE id IN (SELECT id FROM subtree)
"#;

/// Storage for the per-session message forest.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// Every message of a session, oldest first
    async fn find_by_session(&self, session_id: Uuid) -> AppResult<Vec<ChatMessage>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ChatMessage>>;

    /// Insert a message, assigning its sibling index and active flag atomically.
    ///
    /// Fails with `NotFound` when the parent is not part of the session.
    async fn append(&self, message: NewChatMessage) -> AppResult<ChatMessage>;

    /// Make the root-to-`target` path the only active one in the session.
    ///
    /// Returns the ids now active, root first.
    async fn activate_path(&self, session_id: Uuid, target: Uuid) -> AppResult<Vec<Uuid>>;

    /// Delete a message and all of its descendants, returning the row count
    async fn delete_subtree(&self, id: Uuid) -> AppResult<u64>;

    /// The newest `limit` messages of a session, oldest first
    async fn recent(&self, session_id: Uuid, limit: u64) -> AppResult<Vec<ChatMessage>>;

    async fn count_by_session(&self, session_id: Uuid) -> AppResult<u64>;

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64>;

    async fn last_activity_for_user(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>>;
}

/// SeaORM-backed message repository
pub struct ChatMessageStore {
    db: DatabaseConnection,
}

impl ChatMessageStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Take a row lock on the session for the rest of the transaction.
async fn lock_session<C: ConnectionTrait>(conn: &C, session_id: Uuid) -> AppResult<()> {
    SessionEntity::find_by_id(session_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(())
}

async fn session_messages<C: ConnectionTrait>(
    conn: &C,
    session_id: Uuid,
) -> AppResult<Vec<ChatMessage>> {
    let models = MessageEntity::find()
        .filter(chat_message::Column::SessionId.eq(session_id))
        .order_by_asc(chat_message::Column::Timestamp)
        .all(conn)
        .await?;
    Ok(models.into_iter().map(ChatMessage::from).collect())
}

#[async_trait]
impl ChatMessageRepository for ChatMessageStore {
    async fn find_by_session(&self, session_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        session_messages(&self.db, session_id).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ChatMessage>> {
        let result = MessageEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(ChatMessage::from))
    }

    async fn append(&self, message: NewChatMessage) -> AppResult<ChatMessage> {
        let txn = self.db.begin().await?;

        lock_session(&txn, message.session_id).await?;
        let existing = session_messages(&txn, message.session_id).await?;
        let placement = tree::placement(&existing, message.parent_message_id)?;

        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(message.session_id),
            parent_message_id: Set(message.parent_message_id),
            role: Set(message.role),
            content: Set(message.content),
            timestamp: Set(Utc::now()),
            order_index: Set(placement.order_index),
            is_active: Set(placement.is_active),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        tracing::debug!(
            message_id = %model.id,
            session_id = %model.session_id,
            order_index = model.order_index,
            is_active = model.is_active,
            "Message appended"
        );
        Ok(ChatMessage::from(model))
    }

    async fn activate_path(&self, session_id: Uuid, target: Uuid) -> AppResult<Vec<Uuid>> {
        let txn = self.db.begin().await?;

        lock_session(&txn, session_id).await?;
        let messages = session_messages(&txn, session_id).await?;
        let path = tree::activation_set(&messages, target)?;

        let result = MessageEntity::update_many()
            .col_expr(
                chat_message::Column::IsActive,
                Expr::col(chat_message::Column::Id).is_in(path.iter().copied()),
            )
            .filter(chat_message::Column::SessionId.eq(session_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        tracing::debug!(
            session_id = %session_id,
            target = %target,
            depth = path.len(),
            rows = result.rows_affected,
            "Branch switched"
        );
        Ok(path)
    }

    async fn delete_subtree(&self, id: Uuid) -> AppResult<u64> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                DELETE_SUBTREE_SQL,
                [id.into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn recent(&self, session_id: Uuid, limit: u64) -> AppResult<Vec<ChatMessage>> {
        let models = MessageEntity::find()
            .filter(chat_message::Column::SessionId.eq(session_id))
            .order_by_desc(chat_message::Column::Timestamp)
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut messages: Vec<ChatMessage> = models.into_iter().map(ChatMessage::from).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn count_by_session(&self, session_id: Uuid) -> AppResult<u64> {
        let count = MessageEntity::find()
            .filter(chat_message::Column::SessionId.eq(session_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let count = MessageEntity::find()
            .inner_join(SessionEntity)
            .filter(chat_session::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn last_activity_for_user(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>> {
        let latest = MessageEntity::find()
            .select_only()
            .column_as(chat_message::Column::Timestamp.max(), "last_activity")
            .inner_join(SessionEntity)
            .filter(chat_session::Column::UserId.eq(user_id))
            .into_tuple::<Option<DateTime<Utc>>>()
            .one(&self.db)
            .await?;
        Ok(latest.flatten())
    }
}
