//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use treechat::domain::{
    tree, ChatMessage, ChatSession, NewChatMessage, Password, SessionSummary, User, UserRole,
};
use treechat::errors::{AppError, AppResult};
use treechat::infra::{
    ChatMessageRepository, ChatSessionRepository, MockChatMessageRepository,
    MockChatSessionRepository, MockTokenRepository, MockUserRepository, TokenRepository,
    TransactionContext, UnitOfWork, UserRepository,
};

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-32chars";
pub const TEST_PASSWORD: &str = "correct horse battery";

pub fn create_test_user(id: Uuid, role: UserRole) -> User {
    let now = Utc::now();
    User {
        id,
        name: "Test User".to_string(),
        email: "test@example.com".to_string(),
        password_hash: "hashed".to_string(),
        image: None,
        role,
        admin_approved: false,
        email_verified_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}

/// A user whose stored hash matches `TEST_PASSWORD`
pub fn user_with_password(role: UserRole) -> User {
    let mut user = create_test_user(Uuid::new_v4(), role);
    user.password_hash = Password::new(TEST_PASSWORD)
        .map(Password::into_string)
        .unwrap();
    user
}

/// Test mock for UnitOfWork over arbitrary repositories.
///
/// Repositories left at their default are fresh mocks with no expectations,
/// so any call into them fails the test.
pub struct TestUnitOfWork {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    sessions: Arc<dyn ChatSessionRepository>,
    messages: Arc<dyn ChatMessageRepository>,
}

impl Default for TestUnitOfWork {
    fn default() -> Self {
        Self {
            users: Arc::new(MockUserRepository::new()),
            tokens: Arc::new(MockTokenRepository::new()),
            sessions: Arc::new(MockChatSessionRepository::new()),
            messages: Arc::new(MockChatMessageRepository::new()),
        }
    }
}

impl TestUnitOfWork {
    pub fn with_users(user_repo: MockUserRepository) -> Self {
        Self {
            users: Arc::new(user_repo),
            ..Self::default()
        }
    }

    pub fn with_tokens(mut self, token_repo: MockTokenRepository) -> Self {
        self.tokens = Arc::new(token_repo);
        self
    }

    /// Sessions and messages backed by one in-memory store
    pub fn with_store(store: &MemoryStore) -> Self {
        Self {
            sessions: Arc::new(store.clone()),
            messages: Arc::new(store.clone()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl UnitOfWork for TestUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn tokens(&self) -> Arc<dyn TokenRepository> {
        self.tokens.clone()
    }

    fn sessions(&self) -> Arc<dyn ChatSessionRepository> {
        self.sessions.clone()
    }

    fn messages(&self) -> Arc<dyn ChatMessageRepository> {
        self.messages.clone()
    }

    async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        // Transaction not supported in test mock
        Err(AppError::internal("Transactions not supported in test mock"))
    }

    async fn transaction_serializable<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        // Transaction not supported in test mock
        Err(AppError::internal("Transactions not supported in test mock"))
    }
}

#[derive(Default)]
struct StoreState {
    sessions: Vec<ChatSession>,
    messages: Vec<ChatMessage>,
    ticks: i64,
}

impl StoreState {
    /// Strictly increasing clock so insertion order is visible in timestamps
    fn tick(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        Utc.timestamp_opt(1_700_000_000 + self.ticks, 0).unwrap()
    }

    fn in_session(&self, session_id: Uuid) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }
}

/// In-memory session and message storage following the same tree rules as
/// the database stores.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, user_id: Uuid, title: &str) -> ChatSession {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        let session = ChatSession {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.sessions.push(session.clone());
        session
    }

    pub fn messages(&self, session_id: Uuid) -> Vec<ChatMessage> {
        self.state.lock().unwrap().in_session(session_id)
    }

    pub fn message(&self, id: Uuid) -> ChatMessage {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .unwrap()
    }
}

#[async_trait]
impl ChatSessionRepository for MemoryStore {
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<ChatSession>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .find(|s| s.id == id && s.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SessionSummary>> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<SessionSummary> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| SessionSummary {
                session: s.clone(),
                message_count: state.in_session(s.id).len() as u64,
            })
            .collect();
        sessions.sort_by(|a, b| b.session.updated_at.cmp(&a.session.updated_at));
        Ok(sessions)
    }

    async fn most_recent(&self, user_id: Uuid) -> AppResult<Option<ChatSession>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn create(&self, user_id: Uuid, title: String) -> AppResult<ChatSession> {
        Ok(self.add_session(user_id, &title))
    }

    async fn rename(&self, id: Uuid, title: String) -> AppResult<ChatSession> {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound)?;
        session.title = title;
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn touch(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        if let Some(session) = state.sessions.iter_mut().find(|s| s.id == id) {
            session.updated_at = now;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.retain(|s| s.id != id);
        state.messages.retain(|m| m.session_id != id);
        Ok(())
    }

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let state = self.state.lock().unwrap();
        Ok(state.sessions.iter().filter(|s| s.user_id == user_id).count() as u64)
    }
}

#[async_trait]
impl ChatMessageRepository for MemoryStore {
    async fn find_by_session(&self, session_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        Ok(self.messages(session_id))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ChatMessage>> {
        let state = self.state.lock().unwrap();
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn append(&self, message: NewChatMessage) -> AppResult<ChatMessage> {
        let mut state = self.state.lock().unwrap();
        let existing = state.in_session(message.session_id);
        let placement = tree::placement(&existing, message.parent_message_id)?;
        let timestamp = state.tick();

        let stored = ChatMessage {
            id: Uuid::new_v4(),
            session_id: message.session_id,
            parent_message_id: message.parent_message_id,
            role: message.role,
            content: message.content,
            timestamp,
            order_index: placement.order_index,
            is_active: placement.is_active,
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn activate_path(&self, session_id: Uuid, target: Uuid) -> AppResult<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let path = tree::activation_set(&state.in_session(session_id), target)?;

        let (mut in_session, rest): (Vec<ChatMessage>, Vec<ChatMessage>) = state
            .messages
            .drain(..)
            .partition(|m| m.session_id == session_id);
        tree::apply_activation(&mut in_session, &path);
        state.messages = rest;
        state.messages.extend(in_session);
        Ok(path)
    }

    async fn delete_subtree(&self, id: Uuid) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let Some(session_id) = state.messages.iter().find(|m| m.id == id).map(|m| m.session_id)
        else {
            return Ok(0);
        };
        let doomed = tree::subtree_ids(&state.in_session(session_id), id);
        state.messages.retain(|m| !doomed.contains(&m.id));
        Ok(doomed.len() as u64)
    }

    async fn recent(&self, session_id: Uuid, limit: u64) -> AppResult<Vec<ChatMessage>> {
        let mut messages = self.messages(session_id);
        messages.sort_by_key(|m| m.timestamp);
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn count_by_session(&self, session_id: Uuid) -> AppResult<u64> {
        Ok(self.messages(session_id).len() as u64)
    }

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let state = self.state.lock().unwrap();
        let owned: Vec<Uuid> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();
        Ok(state
            .messages
            .iter()
            .filter(|m| owned.contains(&m.session_id))
            .count() as u64)
    }

    async fn last_activity_for_user(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>> {
        let state = self.state.lock().unwrap();
        let owned: Vec<Uuid> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();
        Ok(state
            .messages
            .iter()
            .filter(|m| owned.contains(&m.session_id))
            .map(|m| m.timestamp)
            .max())
    }
}
