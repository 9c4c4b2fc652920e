//! Chat sessions and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{ASSISTANT_DISPLAY_NAME, ASSISTANT_ROLE, FALLBACK_USER_ROLE};

/// A conversation owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "New Chat")]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session row with its message count, as listed in the sidebar
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: ChatSession,
    pub message_count: u64,
}

/// One node of a session's message tree.
///
/// `role` is `assistant` for model output; user turns carry the author's
/// display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Position among siblings sharing the same parent
    pub order_index: i32,
    /// Whether this node lies on the displayed conversation path
    pub is_active: bool,
}

impl ChatMessage {
    pub fn is_assistant(&self) -> bool {
        self.role == ASSISTANT_ROLE
    }

    pub fn is_root(&self) -> bool {
        self.parent_message_id.is_none()
    }
}

/// Who authored a message, before it is turned into a stored role string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    User { name: Option<String> },
    Assistant,
}

impl Author {
    /// Role string persisted on the message row.
    pub fn stored_role(&self) -> String {
        match self {
            Author::Assistant => ASSISTANT_ROLE.to_string(),
            Author::User { name } => name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(FALLBACK_USER_ROLE)
                .to_string(),
        }
    }
}

/// Message to be appended to a session tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub session_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub role: String,
    pub content: String,
}

/// Linear history entry in the shape the chat page expects
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub id: Uuid,
    /// `user` or `assistant`
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub user_name: String,
}

impl From<ChatMessage> for HistoryEntry {
    fn from(message: ChatMessage) -> Self {
        let (role, user_name) = if message.is_assistant() {
            (ASSISTANT_ROLE.to_string(), ASSISTANT_DISPLAY_NAME.to_string())
        } else {
            (FALLBACK_USER_ROLE.to_string(), message.role)
        };
        Self {
            id: message.id,
            role,
            content: message.content,
            timestamp: message.timestamp,
            user_name,
        }
    }
}

/// Per-user chat statistics
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ChatStats {
    pub total_sessions: u64,
    pub total_messages: u64,
    pub last_activity: Option<DateTime<Utc>>,
}
