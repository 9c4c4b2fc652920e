//! Verification token entity.

use sea_orm::entity::prelude::*;

use crate::domain::{TokenPurpose, VerificationToken};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "verification_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub identifier: String,
    pub purpose: String,
    pub token_hash: String,
    pub expires_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for VerificationToken {
    fn from(model: Model) -> Self {
        let purpose = if model.purpose == TokenPurpose::PasswordReset.as_str() {
            TokenPurpose::PasswordReset
        } else {
            TokenPurpose::EmailOtp
        };
        VerificationToken {
            id: model.id,
            identifier: model.identifier,
            purpose,
            token_hash: model.token_hash,
            expires_at: model.expires_at,
            created_at: model.created_at,
        }
    }
}
