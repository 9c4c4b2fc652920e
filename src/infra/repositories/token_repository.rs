//! Verification token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::entities::verification_token::{self, ActiveModel, Entity as TokenEntity};
use crate::domain::{TokenPurpose, VerificationToken};
use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Storage for hashed one-time secrets, keyed by email and purpose.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Store a new token, deleting earlier ones for the same email and purpose.
    async fn issue(
        &self,
        identifier: &str,
        purpose: TokenPurpose,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> AppResult<VerificationToken>;

    /// Most recently issued token, expired or not.
    async fn latest(
        &self,
        identifier: &str,
        purpose: TokenPurpose,
    ) -> AppResult<Option<VerificationToken>>;

    async fn delete_all(&self, identifier: &str, purpose: TokenPurpose) -> AppResult<u64>;
}

/// SeaORM-backed token repository
pub struct TokenStore {
    db: DatabaseConnection,
}

impl TokenStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) async fn delete_all_in<C: ConnectionTrait>(
    conn: &C,
    identifier: &str,
    purpose: TokenPurpose,
) -> AppResult<u64> {
    let result = TokenEntity::delete_many()
        .filter(verification_token::Column::Identifier.eq(identifier))
        .filter(verification_token::Column::Purpose.eq(purpose.as_str()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

#[async_trait]
impl TokenRepository for TokenStore {
    async fn issue(
        &self,
        identifier: &str,
        purpose: TokenPurpose,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> AppResult<VerificationToken> {
        let txn = self.db.begin().await?;

        let superseded = delete_all_in(&txn, identifier, purpose).await?;
        if superseded > 0 {
            tracing::debug!(purpose = %purpose, superseded, "Superseded earlier tokens");
        }

        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            identifier: Set(identifier.to_string()),
            purpose: Set(purpose.as_str().to_string()),
            token_hash: Set(token_hash),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(VerificationToken::from(model))
    }

    async fn latest(
        &self,
        identifier: &str,
        purpose: TokenPurpose,
    ) -> AppResult<Option<VerificationToken>> {
        let result = TokenEntity::find()
            .filter(verification_token::Column::Identifier.eq(identifier))
            .filter(verification_token::Column::Purpose.eq(purpose.as_str()))
            .order_by_desc(verification_token::Column::CreatedAt)
            .one(&self.db)
            .await?;
        Ok(result.map(VerificationToken::from))
    }

    async fn delete_all(&self, identifier: &str, purpose: TokenPurpose) -> AppResult<u64> {
        delete_all_in(&self.db, identifier, purpose).await
    }
}
