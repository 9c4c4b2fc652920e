//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.
//!
//! Repository access goes through the Unit of Work; the chat service
//! composes the session and conversation services.

mod admin_service;
mod auth_service;
mod chat_service;
pub mod container;
mod conversation_service;
mod session_service;
mod user_service;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use admin_service::{provision_admin, AdminManager, AdminService};
pub use auth_service::{AuthService, Authenticator, Claims, Registration, SignIn, TokenResponse};
pub use chat_service::{ChatManager, ChatReply, ChatRequest, ChatService, StreamingReply};
pub use conversation_service::{
    ConversationManager, ConversationService, EditedMessage, SessionTree,
};
pub use session_service::{SessionManager, SessionService};
pub use user_service::{UserManager, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
