//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.

pub mod chat_message;
pub mod chat_session;
pub mod user;
pub mod verification_token;
