//! Infrastructure layer - External systems integration
//!
//! - Database connections and repositories
//! - Redis for rate limits and session revocation
//! - The hosted language model
//! - SMTP delivery
//! - Unit of Work for transaction management

pub mod cache;
pub mod db;
pub mod llm;
pub mod mail;
pub mod repositories;
pub mod unit_of_work;

pub use cache::{Cache, RateLimiter, SessionStore};
pub use db::{Database, Migrator};
pub use llm::{ChatModel, ChatTurn, GeminiClient, ReplyStream, TurnRole, WelcomeModel};
pub use mail::{EmailMessage, LogMailer, Mailer, SmtpMailer};
pub use repositories::{
    ChatMessageRepository, ChatMessageStore, ChatSessionRepository, ChatSessionStore,
    TokenRepository, TokenStore, UserRepository, UserStore,
};
pub use unit_of_work::{
    Persistence, TransactionContext, TxTokenRepository, TxUserRepository, UnitOfWork,
};

#[cfg(any(test, feature = "test-utils"))]
pub use cache::{MockRateLimiter, MockSessionStore};
#[cfg(any(test, feature = "test-utils"))]
pub use llm::MockChatModel;
#[cfg(any(test, feature = "test-utils"))]
pub use mail::MockMailer;
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::{
    MockChatMessageRepository, MockChatSessionRepository, MockTokenRepository,
    MockUserRepository,
};
