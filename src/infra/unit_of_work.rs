//! Unit of Work: repository access plus transaction management.
//!
//! Services depend on `UnitOfWork` rather than on individual stores, so a
//! single handle reaches every repository and can open a transaction when
//! several writes must commit together.

use async_trait::async_trait;
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::repositories::{
    delete_tokens_in, find_user_by_email_in, mark_email_verified_in, update_password_in,
    ChatMessageRepository, ChatMessageStore, ChatSessionRepository, ChatSessionStore,
    TokenRepository, TokenStore, UserRepository, UserStore,
};
use crate::domain::{TokenPurpose, User};
use crate::errors::{AppError, AppResult};

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly because of the generic transaction methods; tests
/// implement it over mocked repositories instead.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;

    fn tokens(&self) -> Arc<dyn TokenRepository>;

    fn sessions(&self) -> Arc<dyn ChatSessionRepository>;

    fn messages(&self) -> Arc<dyn ChatMessageRepository>;

    /// Run `f` in a ReadCommitted transaction, committing on `Ok`.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send;

    /// Same as `transaction` with serializable isolation.
    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send;
}

/// Repository access bound to one open transaction.
pub struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub fn users(&self) -> TxUserRepository<'_> {
        TxUserRepository { txn: self.txn }
    }

    pub fn tokens(&self) -> TxTokenRepository<'_> {
        TxTokenRepository { txn: self.txn }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
    token_repo: Arc<TokenStore>,
    session_repo: Arc<ChatSessionStore>,
    message_repo: Arc<ChatMessageStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            user_repo: Arc::new(UserStore::new(db.clone())),
            token_repo: Arc::new(TokenStore::new(db.clone())),
            session_repo: Arc::new(ChatSessionStore::new(db.clone())),
            message_repo: Arc::new(ChatMessageStore::new(db.clone())),
            db,
        }
    }

    async fn execute_transaction<F, T>(&self, isolation: IsolationLevel, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(Some(isolation), Some(AccessMode::ReadWrite))
            .await
            .map_err(AppError::from)?;

        let ctx = TransactionContext::new(&txn);

        match f(ctx).await {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    fn tokens(&self) -> Arc<dyn TokenRepository> {
        self.token_repo.clone()
    }

    fn sessions(&self) -> Arc<dyn ChatSessionRepository> {
        self.session_repo.clone()
    }

    fn messages(&self) -> Arc<dyn ChatMessageRepository> {
        self.message_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::ReadCommitted, f).await
    }

    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::Serializable, f).await
    }
}

/// User writes that must commit together with token cleanup.
pub struct TxUserRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxUserRepository<'_> {
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_user_by_email_in(self.txn, email).await
    }

    pub async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        update_password_in(self.txn, id, password_hash).await
    }

    pub async fn mark_email_verified(&self, id: Uuid) -> AppResult<()> {
        mark_email_verified_in(self.txn, id).await
    }
}

/// Token operations inside a transaction
pub struct TxTokenRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxTokenRepository<'_> {
    pub async fn delete_all(&self, identifier: &str, purpose: TokenPurpose) -> AppResult<u64> {
        delete_tokens_in(self.txn, identifier, purpose).await
    }
}

/// Run a block inside `UnitOfWork::transaction` without spelling out the boxing.
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| Box::pin(async move { $body })).await
    };
    (serializable $uow:expr, |$ctx:ident| $body:expr) => {
        $uow
            .transaction_serializable(|$ctx| Box::pin(async move { $body }))
            .await
    };
}
