//! HTTP request handlers.

pub mod admin_handler;
pub mod auth_handler;
pub mod chat_handler;
pub mod message_handler;
pub mod session_handler;
pub mod user_handler;

pub use admin_handler::admin_routes;
pub use auth_handler::auth_routes;
pub use chat_handler::chat_routes;
pub use message_handler::message_routes;
pub use session_handler::session_routes;
pub use user_handler::user_routes;
