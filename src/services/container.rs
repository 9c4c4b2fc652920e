//! Service Container - Centralized service access.
//!
//! Handlers only see the service traits; the concrete managers are wired
//! once at startup in [`Services::from_parts`].

use std::sync::Arc;
use std::time::Duration;

use super::{
    AdminManager, AdminService, AuthService, Authenticator, ChatManager, ChatService,
    ConversationManager, ConversationService, SessionManager, SessionService, UserManager,
    UserService,
};
use crate::config::Config;
use crate::infra::{ChatModel, Mailer, Persistence, SessionStore};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn users(&self) -> Arc<dyn UserService>;

    fn admin(&self) -> Arc<dyn AdminService>;

    fn sessions(&self) -> Arc<dyn SessionService>;

    fn conversations(&self) -> Arc<dyn ConversationService>;

    fn chat(&self) -> Arc<dyn ChatService>;
}

/// Concrete implementation of ServiceContainer
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
    admin_service: Arc<dyn AdminService>,
    session_service: Arc<dyn SessionService>,
    conversation_service: Arc<dyn ConversationService>,
    chat_service: Arc<dyn ChatService>,
}

impl Services {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        admin_service: Arc<dyn AdminService>,
        session_service: Arc<dyn SessionService>,
        conversation_service: Arc<dyn ConversationService>,
        chat_service: Arc<dyn ChatService>,
    ) -> Self {
        Self {
            auth_service,
            user_service,
            admin_service,
            session_service,
            conversation_service,
            chat_service,
        }
    }

    /// Wire every service over one database connection and the shared adapters.
    pub fn from_parts(
        db: sea_orm::DatabaseConnection,
        session_store: Arc<dyn SessionStore>,
        model: Arc<dyn ChatModel>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        let uow = Arc::new(Persistence::new(db));
        let chunk_delay = Duration::from_millis(config.llm.chunk_delay_ms);

        let session_service: Arc<dyn SessionService> = Arc::new(SessionManager::new(uow.clone()));
        let conversation_service: Arc<dyn ConversationService> =
            Arc::new(ConversationManager::new(uow.clone()));
        let chat_service = Arc::new(ChatManager::new(
            session_service.clone(),
            conversation_service.clone(),
            model,
            chunk_delay,
        ));

        Self {
            auth_service: Arc::new(Authenticator::new(
                uow.clone(),
                session_store.clone(),
                mailer,
                config.clone(),
            )),
            user_service: Arc::new(UserManager::new(uow.clone())),
            admin_service: Arc::new(AdminManager::new(uow, session_store, config)),
            session_service,
            conversation_service,
            chat_service,
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    fn admin(&self) -> Arc<dyn AdminService> {
        self.admin_service.clone()
    }

    fn sessions(&self) -> Arc<dyn SessionService> {
        self.session_service.clone()
    }

    fn conversations(&self) -> Arc<dyn ConversationService> {
        self.conversation_service.clone()
    }

    fn chat(&self) -> Arc<dyn ChatService> {
        self.chat_service.clone()
    }
}
