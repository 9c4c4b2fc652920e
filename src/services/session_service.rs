//! Chat sessions: listing, lifecycle, linear history and stats.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{DEFAULT_HISTORY_LIMIT, DEFAULT_SESSION_TITLE, MAX_HISTORY_LIMIT, MAX_TITLE_LENGTH};
use crate::domain::{ChatSession, ChatStats, HistoryEntry, SessionSummary};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait SessionService: Send + Sync {
    /// Most recently active first
    async fn list_sessions(&self, user_id: Uuid) -> AppResult<Vec<SessionSummary>>;

    async fn create_session(&self, user_id: Uuid, title: Option<String>) -> AppResult<ChatSession>;

    async fn get_session(&self, user_id: Uuid, id: Uuid) -> AppResult<SessionSummary>;

    async fn rename_session(&self, user_id: Uuid, id: Uuid, title: String) -> AppResult<ChatSession>;

    /// Deletes the session and, through the cascade, all of its messages
    async fn delete_session(&self, user_id: Uuid, id: Uuid) -> AppResult<()>;

    /// Owned session by id, 404 otherwise
    async fn owned_session(&self, user_id: Uuid, id: Uuid) -> AppResult<ChatSession>;

    /// The most recently updated session, created when the user has none.
    async fn current_session(&self, user_id: Uuid) -> AppResult<ChatSession>;

    /// Latest messages of the most recent session, oldest first
    async fn history(&self, user_id: Uuid, limit: Option<u64>) -> AppResult<Vec<HistoryEntry>>;

    async fn stats(&self, user_id: Uuid) -> AppResult<ChatStats>;
}

pub struct SessionManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> SessionManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

fn clean_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LENGTH as usize {
        return Err(AppError::bad_request(format!(
            "Title must be between 1 and {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

#[async_trait]
impl<U: UnitOfWork> SessionService for SessionManager<U> {
    async fn list_sessions(&self, user_id: Uuid) -> AppResult<Vec<SessionSummary>> {
        self.uow.sessions().list_for_user(user_id).await
    }

    async fn create_session(&self, user_id: Uuid, title: Option<String>) -> AppResult<ChatSession> {
        let title = match title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => clean_title(t)?,
            _ => DEFAULT_SESSION_TITLE.to_string(),
        };
        self.uow.sessions().create(user_id, title).await
    }

    async fn get_session(&self, user_id: Uuid, id: Uuid) -> AppResult<SessionSummary> {
        let session = self.owned_session(user_id, id).await?;
        let message_count = self.uow.messages().count_by_session(id).await?;
        Ok(SessionSummary {
            session,
            message_count,
        })
    }

    async fn rename_session(&self, user_id: Uuid, id: Uuid, title: String) -> AppResult<ChatSession> {
        let title = clean_title(&title)?;
        self.owned_session(user_id, id).await?;
        self.uow.sessions().rename(id, title).await
    }

    async fn delete_session(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        self.owned_session(user_id, id).await?;
        self.uow.sessions().delete(id).await?;
        tracing::info!(session_id = %id, user_id = %user_id, "Chat session deleted");
        Ok(())
    }

    async fn owned_session(&self, user_id: Uuid, id: Uuid) -> AppResult<ChatSession> {
        self.uow
            .sessions()
            .find_owned(id, user_id)
            .await?
            .ok_or_not_found()
    }

    async fn current_session(&self, user_id: Uuid) -> AppResult<ChatSession> {
        let sessions = self.uow.sessions();
        match sessions.most_recent(user_id).await? {
            Some(session) => {
                sessions.touch(session.id).await?;
                Ok(session)
            }
            None => {
                sessions
                    .create(user_id, DEFAULT_SESSION_TITLE.to_string())
                    .await
            }
        }
    }

    async fn history(&self, user_id: Uuid, limit: Option<u64>) -> AppResult<Vec<HistoryEntry>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        let Some(session) = self.uow.sessions().most_recent(user_id).await? else {
            return Ok(Vec::new());
        };

        let messages = self.uow.messages().recent(session.id, limit).await?;
        Ok(messages.into_iter().map(HistoryEntry::from).collect())
    }

    async fn stats(&self, user_id: Uuid) -> AppResult<ChatStats> {
        let total_sessions = self.uow.sessions().count_for_user(user_id).await?;
        let total_messages = self.uow.messages().count_for_user(user_id).await?;
        let last_activity = self.uow.messages().last_activity_for_user(user_id).await?;

        Ok(ChatStats {
            total_sessions,
            total_messages,
            last_activity,
        })
    }
}
