//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    admin_handler, auth_handler, chat_handler, message_handler, session_handler, user_handler,
};
use crate::domain::{
    BranchPoint, ChatMessage, ChatSession, ChatStats, HistoryEntry, MessageNode, SessionSummary,
    UserResponse, UserRole, UserStats,
};
use crate::services::{ChatReply, EditedMessage, SessionTree, TokenResponse};
use crate::types::{MessageResponse, PaginationMeta};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "treechat",
        version = "0.1.0",
        description = "Accounts, an admin console and a branching LLM chatbot",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        auth_handler::register,
        auth_handler::login,
        auth_handler::logout,
        auth_handler::verify_otp,
        auth_handler::resend_otp,
        auth_handler::forgot_password,
        auth_handler::reset_password,
        auth_handler::role,
        user_handler::get_current_user,
        user_handler::update_current_user,
        user_handler::change_password,
        admin_handler::list_users,
        admin_handler::approve_admin,
        admin_handler::delete_user,
        admin_handler::change_role,
        admin_handler::stats,
        chat_handler::send_message,
        chat_handler::stream_message,
        chat_handler::history,
        chat_handler::stats,
        session_handler::list_sessions,
        session_handler::create_session,
        session_handler::get_session,
        session_handler::rename_session,
        session_handler::delete_session,
        session_handler::session_tree,
        session_handler::append_message,
        session_handler::fork,
        session_handler::switch_branch,
        message_handler::conversation_branch,
        message_handler::edit_message,
        message_handler::delete_message,
    ),
    components(
        schemas(
            // Domain types
            UserRole,
            UserResponse,
            UserStats,
            ChatSession,
            SessionSummary,
            ChatMessage,
            MessageNode,
            BranchPoint,
            HistoryEntry,
            ChatStats,
            // Service results
            TokenResponse,
            ChatReply,
            SessionTree,
            EditedMessage,
            // Shared
            MessageResponse,
            PaginationMeta,
            // Request and response bodies
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            auth_handler::LoginResponse,
            auth_handler::VerifyOtpRequest,
            auth_handler::EmailRequest,
            auth_handler::ForgotPasswordResponse,
            auth_handler::ResetPasswordRequest,
            auth_handler::RoleResponse,
            user_handler::UpdateProfileRequest,
            user_handler::ChangePasswordRequest,
            admin_handler::UserPage,
            admin_handler::ChangeRoleRequest,
            chat_handler::ChatMessageRequest,
            session_handler::CreateSessionRequest,
            session_handler::RenameSessionRequest,
            session_handler::AppendMessageRequest,
            session_handler::ForkRequest,
            session_handler::SwitchBranchRequest,
            session_handler::ConversationPath,
            message_handler::EditMessageRequest,
            message_handler::DeletedMessages,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Signup, login, email verification and password reset"),
        (name = "Users", description = "Profile self-service"),
        (name = "Admin", description = "User management, admins only"),
        (name = "Chat", description = "Talk to the assistant"),
        (name = "Sessions", description = "Chat sessions and their message trees"),
        (name = "Messages", description = "Branch paths, edits and deletes")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from /auth/login; the session_token cookie also works"))
                        .build(),
                ),
            );
        }
    }
}
