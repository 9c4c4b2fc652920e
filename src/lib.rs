//! treechat - accounts, an admin console and a chatbot whose history is a tree.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Users, tokens, chat sessions and the message tree algorithms
//! - **services**: Application use cases
//! - **infra**: Postgres, Redis, the Gemini API and SMTP
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared types (pagination, responses)
//! - **utils**: Email templates
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! treechat serve
//!
//! # Run migrations
//! treechat migrate up
//!
//! # Create the first admin
//! treechat create-admin --email admin@example.com --password 'change-me-now'
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod services;
pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{ChatMessage, Password, User, UserRole};
pub use errors::{AppError, AppResult};
pub use infra::Cache;
