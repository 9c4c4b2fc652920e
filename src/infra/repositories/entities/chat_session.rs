//! Chat session entity.

use sea_orm::entity::prelude::*;
use sea_orm::FromQueryResult;

use crate::domain::{ChatSession, SessionSummary};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chat_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::chat_message::Entity")]
    ChatMessages,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::chat_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatMessages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ChatSession {
    fn from(model: Model) -> Self {
        ChatSession {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Session row joined with its message count
#[derive(Debug, FromQueryResult)]
pub struct SessionWithCount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub message_count: i64,
}

impl From<SessionWithCount> for SessionSummary {
    fn from(row: SessionWithCount) -> Self {
        SessionSummary {
            session: ChatSession {
                id: row.id,
                user_id: row.user_id,
                title: row.title,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            message_count: row.message_count.max(0) as u64,
        }
    }
}
