//! Chat message entity with its self-referencing parent pointer.

use sea_orm::entity::prelude::*;

use crate::domain::ChatMessage;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub role: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub timestamp: DateTimeUtc,
    pub order_index: i32,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat_session::Entity",
        from = "Column::SessionId",
        to = "super::chat_session::Column::Id",
        on_delete = "Cascade"
    )]
    ChatSession,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentMessageId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
}

impl Related<super::chat_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ChatMessage {
    fn from(model: Model) -> Self {
        ChatMessage {
            id: model.id,
            session_id: model.session_id,
            parent_message_id: model.parent_message_id,
            role: model.role,
            content: model.content,
            timestamp: model.timestamp,
            order_index: model.order_index,
            is_active: model.is_active,
        }
    }
}
