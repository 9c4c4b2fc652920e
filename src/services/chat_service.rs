//! Chatbot: stores the user's turn, asks the model, stores the reply.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ConversationService, SessionService};
use crate::domain::{Author, ChatMessage};
use crate::errors::AppResult;
use crate::infra::llm::{fallback_reply, ChatModel, ChatTurn};

/// A prompt from the chat page
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    /// Defaults to the user's current session
    pub session_id: Option<Uuid>,
    /// Defaults to the active leaf
    pub parent_id: Option<Uuid>,
}

/// Non-streaming reply
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatReply {
    pub response: String,
    pub session_id: Uuid,
    pub user_message_id: Uuid,
    pub assistant_message_id: Uuid,
}

/// Streaming reply; the text arrives on `chunks`
pub struct StreamingReply {
    pub session_id: Uuid,
    pub user_message_id: Uuid,
    pub chunks: BoxStream<'static, String>,
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send(
        &self,
        user_id: Uuid,
        user_name: Option<String>,
        request: ChatRequest,
    ) -> AppResult<ChatReply>;

    /// Start a streamed reply. The reply is stored once the model finishes,
    /// whether or not the client is still reading.
    async fn stream(
        &self,
        user_id: Uuid,
        user_name: Option<String>,
        request: ChatRequest,
    ) -> AppResult<StreamingReply>;
}

pub struct ChatManager {
    sessions: Arc<dyn SessionService>,
    conversations: Arc<dyn ConversationService>,
    model: Arc<dyn ChatModel>,
    chunk_delay: Duration,
}

/// User turn stored and the context to send with it
struct PreparedTurn {
    session_id: Uuid,
    user_message: ChatMessage,
    history: Vec<ChatTurn>,
}

impl ChatManager {
    pub fn new(
        sessions: Arc<dyn SessionService>,
        conversations: Arc<dyn ConversationService>,
        model: Arc<dyn ChatModel>,
        chunk_delay: Duration,
    ) -> Self {
        Self {
            sessions,
            conversations,
            model,
            chunk_delay,
        }
    }

    async fn prepare(
        &self,
        user_id: Uuid,
        user_name: Option<String>,
        request: &ChatRequest,
    ) -> AppResult<PreparedTurn> {
        let session = match request.session_id {
            Some(id) => self.sessions.owned_session(user_id, id).await?,
            None => self.sessions.current_session(user_id).await?,
        };

        let mut user_message = self
            .conversations
            .append(
                user_id,
                session.id,
                Author::User { name: user_name },
                request.message.clone(),
                request.parent_id,
            )
            .await?;

        // A turn sent from another branch moves the conversation there
        if !user_message.is_active {
            self.conversations
                .switch_branch(user_id, session.id, user_message.id)
                .await?;
            user_message.is_active = true;
        }

        let mut path = self
            .conversations
            .conversation_branch(user_id, user_message.id)
            .await?;
        path.pop();

        Ok(PreparedTurn {
            session_id: session.id,
            history: path.iter().map(ChatTurn::from).collect(),
            user_message,
        })
    }
}

#[async_trait]
impl ChatService for ChatManager {
    async fn send(
        &self,
        user_id: Uuid,
        user_name: Option<String>,
        request: ChatRequest,
    ) -> AppResult<ChatReply> {
        let turn = self.prepare(user_id, user_name, &request).await?;
        let prompt = turn.user_message.content.clone();

        let reply = match self.model.complete(&turn.history, &prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!(session_id = %turn.session_id, "Model returned an empty reply");
                fallback_reply(&prompt)
            }
            Err(e) => {
                tracing::warn!(session_id = %turn.session_id, error = %e, "Model call failed, using fallback reply");
                fallback_reply(&prompt)
            }
        };

        let assistant = self
            .conversations
            .append(
                user_id,
                turn.session_id,
                Author::Assistant,
                reply.clone(),
                Some(turn.user_message.id),
            )
            .await?;

        Ok(ChatReply {
            response: reply,
            session_id: turn.session_id,
            user_message_id: turn.user_message.id,
            assistant_message_id: assistant.id,
        })
    }

    async fn stream(
        &self,
        user_id: Uuid,
        user_name: Option<String>,
        request: ChatRequest,
    ) -> AppResult<StreamingReply> {
        let turn = self.prepare(user_id, user_name, &request).await?;
        let prompt = turn.user_message.content.clone();
        let upstream = self.model.stream(&turn.history, &prompt).await;

        let (tx, rx) = mpsc::unbounded::<String>();
        let conversations = self.conversations.clone();
        let delay = self.chunk_delay;
        let session_id = turn.session_id;
        let user_message_id = turn.user_message.id;

        tokio::spawn(async move {
            let emit = |text: String| {
                // The client may be gone; the reply is still stored
                let _ = tx.unbounded_send(text);
            };

            let mut reply = String::new();
            match upstream {
                Ok(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        match chunk {
                            Ok(text) => {
                                reply.push_str(&text);
                                emit(text);
                                if !delay.is_zero() {
                                    tokio::time::sleep(delay).await;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(session_id = %session_id, error = %e, "Model stream failed, using fallback reply");
                                // Stored text is exactly what the client received
                                let fallback = fallback_reply(&prompt);
                                reply.push_str(&fallback);
                                emit(fallback);
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Model call failed, using fallback reply");
                    reply = fallback_reply(&prompt);
                    emit(reply.clone());
                }
            }

            let reply = reply.trim();
            if reply.is_empty() {
                tracing::warn!(session_id = %session_id, "Streamed reply was empty, nothing stored");
                return;
            }

            if let Err(e) = conversations
                .append(
                    user_id,
                    session_id,
                    Author::Assistant,
                    reply.to_string(),
                    Some(user_message_id),
                )
                .await
            {
                tracing::error!(session_id = %session_id, error = %e, "Failed to store streamed reply");
            }
        });

        Ok(StreamingReply {
            session_id,
            user_message_id,
            chunks: rx.boxed(),
        })
    }
}
