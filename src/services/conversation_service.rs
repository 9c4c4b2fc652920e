//! Tree-structured conversations: views, appends, forks and branch switching.
//!
//! Ownership is checked here; the atomic parts of every mutation (sibling
//! index, active flag, path activation) live in the message repository.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::tree::{self, BranchPoint, MessageNode};
use crate::domain::{Author, ChatMessage, ChatSession, NewChatMessage};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

/// Everything the chat page needs to render a session
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SessionTree {
    /// Active root-to-leaf path
    pub conversation_path: Vec<ChatMessage>,
    pub tree: Vec<MessageNode>,
    /// Messages with more than one child
    pub branches: Vec<BranchPoint>,
}

/// Result of editing a message into a new branch
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EditedMessage {
    pub message: ChatMessage,
    pub conversation_path: Vec<ChatMessage>,
}

#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Tree view of a session. Empty when the session is missing or not owned.
    async fn session_tree(&self, user_id: Uuid, session_id: Uuid) -> AppResult<SessionTree>;

    /// Active path of an owned session
    async fn active_path(&self, user_id: Uuid, session_id: Uuid) -> AppResult<Vec<ChatMessage>>;

    /// Root-to-message path of any message in an owned session
    async fn conversation_branch(&self, user_id: Uuid, message_id: Uuid)
        -> AppResult<Vec<ChatMessage>>;

    /// Add a message under `parent`, or under the active leaf when `parent` is `None`.
    async fn append(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        author: Author,
        content: String,
        parent: Option<Uuid>,
    ) -> AppResult<ChatMessage>;

    /// Add a message under an existing one without touching other nodes.
    async fn fork(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        parent_id: Uuid,
        author: Author,
        content: String,
    ) -> AppResult<ChatMessage>;

    /// Activate the path to `message_id` and return it.
    async fn switch_branch(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<Vec<ChatMessage>>;

    /// Add a sibling with new content and switch to it; the original stays.
    async fn edit_message(
        &self,
        user_id: Uuid,
        message_id: Uuid,
        content: String,
    ) -> AppResult<EditedMessage>;

    /// Delete a message with all of its descendants, returning how many rows went.
    async fn delete_message(&self, user_id: Uuid, message_id: Uuid) -> AppResult<u64>;
}

pub struct ConversationManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> ConversationManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    async fn owned_session(&self, user_id: Uuid, session_id: Uuid) -> AppResult<ChatSession> {
        self.uow
            .sessions()
            .find_owned(session_id, user_id)
            .await?
            .ok_or_not_found()
    }

    async fn owned_message(&self, user_id: Uuid, message_id: Uuid) -> AppResult<ChatMessage> {
        let message = self
            .uow
            .messages()
            .find_by_id(message_id)
            .await?
            .ok_or_not_found()?;
        self.owned_session(user_id, message.session_id).await?;
        Ok(message)
    }

    async fn insert(
        &self,
        session_id: Uuid,
        parent_message_id: Option<Uuid>,
        role: String,
        content: String,
    ) -> AppResult<ChatMessage> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::bad_request("Message content is required"));
        }

        let message = self
            .uow
            .messages()
            .append(NewChatMessage {
                session_id,
                parent_message_id,
                role,
                content,
            })
            .await?;
        self.uow.sessions().touch(session_id).await?;
        Ok(message)
    }
}

#[async_trait]
impl<U: UnitOfWork> ConversationService for ConversationManager<U> {
    async fn session_tree(&self, user_id: Uuid, session_id: Uuid) -> AppResult<SessionTree> {
        if self
            .uow
            .sessions()
            .find_owned(session_id, user_id)
            .await?
            .is_none()
        {
            return Ok(SessionTree::default());
        }

        let messages = self.uow.messages().find_by_session(session_id).await?;
        let forest = tree::build_forest(messages);
        tracing::debug!(
            session_id = %session_id,
            nodes = tree::count_nodes(&forest),
            roots = forest.len(),
            "Loaded session tree"
        );

        Ok(SessionTree {
            conversation_path: tree::active_path(&forest),
            branches: tree::branch_points(&forest),
            tree: forest,
        })
    }

    async fn active_path(&self, user_id: Uuid, session_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        self.owned_session(user_id, session_id).await?;
        let messages = self.uow.messages().find_by_session(session_id).await?;
        Ok(tree::active_path(&tree::build_forest(messages)))
    }

    async fn conversation_branch(
        &self,
        user_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<Vec<ChatMessage>> {
        let message = self.owned_message(user_id, message_id).await?;
        let messages = self.uow.messages().find_by_session(message.session_id).await?;
        tree::path_to(&tree::build_forest(messages), message_id).ok_or_not_found()
    }

    async fn append(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        author: Author,
        content: String,
        parent: Option<Uuid>,
    ) -> AppResult<ChatMessage> {
        self.owned_session(user_id, session_id).await?;

        let parent = match parent {
            Some(id) => Some(id),
            None => {
                let messages = self.uow.messages().find_by_session(session_id).await?;
                tree::active_leaf(&messages)
            }
        };

        self.insert(session_id, parent, author.stored_role(), content)
            .await
    }

    async fn fork(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        parent_id: Uuid,
        author: Author,
        content: String,
    ) -> AppResult<ChatMessage> {
        self.owned_session(user_id, session_id).await?;
        let message = self
            .insert(session_id, Some(parent_id), author.stored_role(), content)
            .await?;

        tracing::info!(
            session_id = %session_id,
            parent_id = %parent_id,
            message_id = %message.id,
            order_index = message.order_index,
            "Branch forked"
        );
        Ok(message)
    }

    async fn switch_branch(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<Vec<ChatMessage>> {
        self.owned_session(user_id, session_id).await?;
        self.uow
            .messages()
            .activate_path(session_id, message_id)
            .await?;

        let messages = self.uow.messages().find_by_session(session_id).await?;
        Ok(tree::active_path(&tree::build_forest(messages)))
    }

    async fn edit_message(
        &self,
        user_id: Uuid,
        message_id: Uuid,
        content: String,
    ) -> AppResult<EditedMessage> {
        let original = self.owned_message(user_id, message_id).await?;
        let session_id = original.session_id;

        let message = self
            .insert(
                session_id,
                original.parent_message_id,
                original.role.clone(),
                content,
            )
            .await?;

        let conversation_path = self.switch_branch(user_id, session_id, message.id).await?;
        let message = conversation_path
            .iter()
            .find(|m| m.id == message.id)
            .cloned()
            .unwrap_or(message);

        tracing::info!(
            original_id = %message_id,
            message_id = %message.id,
            "Message edited into a new branch"
        );
        Ok(EditedMessage {
            message,
            conversation_path,
        })
    }

    async fn delete_message(&self, user_id: Uuid, message_id: Uuid) -> AppResult<u64> {
        let message = self.owned_message(user_id, message_id).await?;
        let deleted = self.uow.messages().delete_subtree(message_id).await?;

        tracing::info!(
            session_id = %message.session_id,
            message_id = %message_id,
            deleted,
            "Message subtree deleted"
        );
        Ok(deleted)
    }
}
