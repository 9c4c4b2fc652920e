//! Session lifecycle, linear history and stats over in-memory storage.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::{MemoryStore, TestUnitOfWork};
use treechat::config::{DEFAULT_SESSION_TITLE, MAX_HISTORY_LIMIT};
use treechat::domain::{Author, NewChatMessage};
use treechat::errors::AppError;
use treechat::infra::ChatMessageRepository;
use treechat::services::{
    ConversationManager, ConversationService, SessionManager, SessionService,
};

struct Fixture {
    store: MemoryStore,
    sessions: SessionManager<TestUnitOfWork>,
    conversations: ConversationManager<TestUnitOfWork>,
    user_id: Uuid,
}

fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let uow = Arc::new(TestUnitOfWork::with_store(&store));
    Fixture {
        sessions: SessionManager::new(uow.clone()),
        conversations: ConversationManager::new(uow),
        store,
        user_id: Uuid::new_v4(),
    }
}

fn user() -> Author {
    Author::User {
        name: Some("Ada".to_string()),
    }
}

impl Fixture {
    async fn say(&self, session_id: Uuid, content: &str, parent: Option<Uuid>) -> Uuid {
        self.conversations
            .append(self.user_id, session_id, user(), content.to_string(), parent)
            .await
            .unwrap()
            .id
    }

    /// Writes a linear chain of `count` messages straight into the store.
    async fn fill(&self, session_id: Uuid, count: usize) {
        let mut parent = None;
        for i in 0..count {
            let stored = ChatMessageRepository::append(
                &self.store,
                NewChatMessage {
                    session_id,
                    parent_message_id: parent,
                    role: "Ada".to_string(),
                    content: format!("message {}", i),
                },
            )
            .await
            .unwrap();
            parent = Some(stored.id);
        }
    }
}

#[tokio::test]
async fn test_create_session_defaults_title() {
    let f = fixture();

    let untitled = f.sessions.create_session(f.user_id, None).await.unwrap();
    let blank = f
        .sessions
        .create_session(f.user_id, Some("   ".to_string()))
        .await
        .unwrap();
    let titled = f
        .sessions
        .create_session(f.user_id, Some("  Trip plans ".to_string()))
        .await
        .unwrap();

    assert_eq!(untitled.title, DEFAULT_SESSION_TITLE);
    assert_eq!(blank.title, DEFAULT_SESSION_TITLE);
    assert_eq!(titled.title, "Trip plans");
    assert_eq!(titled.user_id, f.user_id);
}

#[tokio::test]
async fn test_list_sessions_newest_first_with_counts() {
    let f = fixture();
    let older = f.sessions.create_session(f.user_id, None).await.unwrap();
    let newer = f.sessions.create_session(f.user_id, None).await.unwrap();
    f.sessions.create_session(Uuid::new_v4(), None).await.unwrap();

    let list = f.sessions.list_sessions(f.user_id).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].session.id, newer.id);

    // New messages bump the session to the top
    let a = f.say(older.id, "A", None).await;
    f.say(older.id, "B", Some(a)).await;

    let list = f.sessions.list_sessions(f.user_id).await.unwrap();
    assert_eq!(list[0].session.id, older.id);
    assert_eq!(list[0].message_count, 2);
    assert_eq!(list[1].session.id, newer.id);
    assert_eq!(list[1].message_count, 0);
}

#[tokio::test]
async fn test_get_session_counts_messages() {
    let f = fixture();
    let session = f.sessions.create_session(f.user_id, None).await.unwrap();
    f.fill(session.id, 3).await;

    let summary = f.sessions.get_session(f.user_id, session.id).await.unwrap();

    assert_eq!(summary.session.id, session.id);
    assert_eq!(summary.message_count, 3);
}

#[tokio::test]
async fn test_foreign_session_is_not_found() {
    let f = fixture();
    let theirs = f.store.add_session(Uuid::new_v4(), "Theirs");

    assert!(matches!(
        f.sessions.get_session(f.user_id, theirs.id).await.unwrap_err(),
        AppError::NotFound
    ));
    assert!(matches!(
        f.sessions
            .rename_session(f.user_id, theirs.id, "Mine now".to_string())
            .await
            .unwrap_err(),
        AppError::NotFound
    ));
    assert!(matches!(
        f.sessions.delete_session(f.user_id, theirs.id).await.unwrap_err(),
        AppError::NotFound
    ));

    // Still there for its owner
    assert_eq!(f.store.messages(theirs.id).len(), 0);
    assert!(f
        .sessions
        .get_session(theirs.user_id, theirs.id)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_rename_session() {
    let f = fixture();
    let session = f.sessions.create_session(f.user_id, None).await.unwrap();

    let renamed = f
        .sessions
        .rename_session(f.user_id, session.id, "  Recipes ".to_string())
        .await
        .unwrap();

    assert_eq!(renamed.title, "Recipes");
    assert!(renamed.updated_at > session.updated_at);
}

#[tokio::test]
async fn test_rename_rejects_bad_titles() {
    let f = fixture();
    let session = f.sessions.create_session(f.user_id, None).await.unwrap();

    for title in ["  ".to_string(), "x".repeat(256)] {
        let result = f.sessions.rename_session(f.user_id, session.id, title).await;
        assert!(matches!(result.unwrap_err(), AppError::BadRequest(_)));
    }
}

#[tokio::test]
async fn test_delete_session_removes_its_whole_tree() {
    let f = fixture();
    let kept = f.sessions.create_session(f.user_id, None).await.unwrap();
    let doomed = f.sessions.create_session(f.user_id, None).await.unwrap();

    f.say(kept.id, "keep me", None).await;
    let a = f.say(doomed.id, "A", None).await;
    let b = f.say(doomed.id, "B", Some(a)).await;
    f.say(doomed.id, "B reply", Some(b)).await;
    f.conversations
        .fork(f.user_id, doomed.id, a, user(), "C".to_string())
        .await
        .unwrap();

    let before = f.sessions.stats(f.user_id).await.unwrap();
    assert_eq!(before.total_sessions, 2);
    assert_eq!(before.total_messages, 5);

    f.sessions.delete_session(f.user_id, doomed.id).await.unwrap();

    assert_eq!(f.store.count_by_session(doomed.id).await.unwrap(), 0);
    assert_eq!(
        ChatMessageRepository::count_for_user(&f.store, f.user_id)
            .await
            .unwrap(),
        1
    );
    let after = f.sessions.stats(f.user_id).await.unwrap();
    assert_eq!(after.total_sessions, 1);
    assert_eq!(after.total_messages, 1);
    assert!(matches!(
        f.sessions.get_session(f.user_id, doomed.id).await.unwrap_err(),
        AppError::NotFound
    ));
}

#[tokio::test]
async fn test_current_session_created_when_none_exist() {
    let f = fixture();

    let current = f.sessions.current_session(f.user_id).await.unwrap();

    assert_eq!(current.title, DEFAULT_SESSION_TITLE);
    assert_eq!(current.user_id, f.user_id);
    assert_eq!(f.sessions.list_sessions(f.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_current_session_reuses_and_touches_latest() {
    let f = fixture();
    let first = f.sessions.create_session(f.user_id, None).await.unwrap();
    let second = f.sessions.create_session(f.user_id, None).await.unwrap();

    let current = f.sessions.current_session(f.user_id).await.unwrap();
    assert_eq!(current.id, second.id);

    // Renaming bumps `first`, so it becomes the current one
    f.sessions
        .rename_session(f.user_id, first.id, "Back to this".to_string())
        .await
        .unwrap();
    let current = f.sessions.current_session(f.user_id).await.unwrap();
    assert_eq!(current.id, first.id);

    let list = f.sessions.list_sessions(f.user_id).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].session.id, first.id);
    assert!(list[0].session.updated_at > current.updated_at);
}

#[tokio::test]
async fn test_history_is_empty_without_sessions() {
    let f = fixture();
    assert!(f.sessions.history(f.user_id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_labels_roles() {
    let f = fixture();
    let session = f.sessions.create_session(f.user_id, None).await.unwrap();
    let a = f.say(session.id, "Hi", None).await;
    f.conversations
        .append(
            f.user_id,
            session.id,
            Author::Assistant,
            "Hello!".to_string(),
            Some(a),
        )
        .await
        .unwrap();

    let history = f.sessions.history(f.user_id, None).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[0].user_name, "Ada");
    assert_eq!(history[1].role, "assistant");
    assert_eq!(history[1].user_name, "AI Assistant");
}

#[tokio::test]
async fn test_history_limit_is_clamped() {
    let f = fixture();
    let session = f.sessions.create_session(f.user_id, None).await.unwrap();
    f.fill(session.id, MAX_HISTORY_LIMIT as usize + 5).await;

    let default = f.sessions.history(f.user_id, None).await.unwrap();
    let zero = f.sessions.history(f.user_id, Some(0)).await.unwrap();
    let huge = f.sessions.history(f.user_id, Some(10_000)).await.unwrap();

    assert_eq!(default.len(), 50);
    assert_eq!(zero.len(), 1);
    assert_eq!(huge.len(), MAX_HISTORY_LIMIT as usize);

    // Latest messages, oldest first
    let last = format!("message {}", MAX_HISTORY_LIMIT + 4);
    assert_eq!(zero[0].content, last);
    assert_eq!(huge.last().unwrap().content, last);
    assert!(huge.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn test_stats_for_new_user() {
    let f = fixture();
    let stats = f.sessions.stats(f.user_id).await.unwrap();

    assert_eq!(stats.total_sessions, 0);
    assert_eq!(stats.total_messages, 0);
    assert!(stats.last_activity.is_none());
}
