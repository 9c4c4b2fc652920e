//! Domain layer - Core business entities and logic
//!
//! Accounts, verification tokens, chat sessions and the message tree.
//! Nothing here talks to the database or the network.

pub mod chat;
pub mod password;
pub mod token;
pub mod tree;
pub mod user;

pub use chat::{
    Author, ChatMessage, ChatSession, ChatStats, HistoryEntry, NewChatMessage, SessionSummary,
};
pub use password::Password;
pub use token::{TokenPurpose, VerificationToken};
pub use tree::{BranchPoint, MessageNode, Placement};
pub use user::{normalize_email, NewUser, User, UserResponse, UserRole, UserStats};
