//! Repository layer - Data access abstraction
//!
//! Each aggregate gets a trait (mocked in tests) and a SeaORM-backed store.

pub(crate) mod entities;
mod chat_message_repository;
mod chat_session_repository;
mod token_repository;
mod user_repository;

pub use chat_message_repository::{ChatMessageRepository, ChatMessageStore};
pub use chat_session_repository::{ChatSessionRepository, ChatSessionStore};
pub use token_repository::{TokenRepository, TokenStore};
pub use user_repository::{UserRepository, UserStore};

pub(crate) use token_repository::delete_all_in as delete_tokens_in;
pub(crate) use user_repository::{
    find_by_email_in as find_user_by_email_in, mark_email_verified_in, update_password_in,
};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use chat_message_repository::MockChatMessageRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use chat_session_repository::MockChatSessionRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use token_repository::MockTokenRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
