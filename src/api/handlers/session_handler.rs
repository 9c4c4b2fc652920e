//! Chat sessions and their message trees.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::config::ASSISTANT_ROLE;
use crate::domain::{Author, ChatMessage, ChatSession, SessionSummary};
use crate::errors::AppResult;
use crate::services::SessionTree;
use crate::types::MessageResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSessionRequest {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    #[schema(example = "Trip planning")]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenameSessionRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    #[schema(example = "Trip planning")]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AppendMessageRequest {
    /// Defaults to the end of the active path
    pub parent_id: Option<Uuid>,
    /// `assistant` or `user`
    #[schema(example = "user")]
    pub role: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForkRequest {
    /// Message to branch from
    pub from_message_id: Uuid,
    #[validate(length(min = 1, message = "Message is required"))]
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchBranchRequest {
    pub target_message_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationPath {
    pub conversation_path: Vec<ChatMessage>,
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions).post(create_session))
        .route(
            "/:id",
            get(get_session).put(rename_session).delete(delete_session),
        )
        .route("/:id/tree", get(session_tree))
        .route("/:id/messages", post(append_message))
        .route("/:id/fork", post(fork))
        .route("/:id/branch", post(switch_branch))
}

/// List the caller's sessions, most recent first
#[utoipa::path(
    get,
    path = "/chat/sessions",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Sessions with message counts", body = [SessionSummary]))
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<SessionSummary>>> {
    Ok(Json(
        state.services.sessions().list_sessions(current_user.id).await?,
    ))
}

/// Start a new session
#[utoipa::path(
    post,
    path = "/chat/sessions",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    request_body = CreateSessionRequest,
    responses((status = 201, description = "Session created", body = ChatSession))
)]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<ChatSession>)> {
    let session = state
        .services
        .sessions()
        .create_session(current_user.id, payload.title)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// One session with its message count
#[utoipa::path(
    get,
    path = "/chat/sessions/{id}",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session", body = SessionSummary),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionSummary>> {
    Ok(Json(
        state.services.sessions().get_session(current_user.id, id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/chat/sessions/{id}",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = RenameSessionRequest,
    responses(
        (status = 200, description = "Session renamed", body = ChatSession),
        (status = 404, description = "Session not found")
    )
)]
pub async fn rename_session(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RenameSessionRequest>,
) -> AppResult<Json<ChatSession>> {
    let session = state
        .services
        .sessions()
        .rename_session(current_user.id, id, payload.title)
        .await?;
    Ok(Json(session))
}

/// Delete a session with all of its messages
#[utoipa::path(
    delete,
    path = "/chat/sessions/{id}",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session deleted", body = MessageResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .sessions()
        .delete_session(current_user.id, id)
        .await?;
    Ok(Json(MessageResponse::new("Session deleted successfully")))
}

/// Full message tree with the active path and branch points
#[utoipa::path(
    get,
    path = "/chat/sessions/{id}/tree",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    responses((status = 200, description = "Tree view; empty for sessions you do not own", body = SessionTree))
)]
pub async fn session_tree(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionTree>> {
    Ok(Json(
        state
            .services
            .conversations()
            .session_tree(current_user.id, id)
            .await?,
    ))
}

/// Add a message to the tree
#[utoipa::path(
    post,
    path = "/chat/sessions/{id}/messages",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = AppendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = ChatMessage),
        (status = 404, description = "Session or parent not found")
    )
)]
pub async fn append_message(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AppendMessageRequest>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    let author = if payload.role.trim() == ASSISTANT_ROLE {
        Author::Assistant
    } else {
        Author::User {
            name: current_user.display_name(),
        }
    };

    let message = state
        .services
        .conversations()
        .append(current_user.id, id, author, payload.content, payload.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Branch off an existing message with a new user turn
#[utoipa::path(
    post,
    path = "/chat/sessions/{id}/fork",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = ForkRequest,
    responses(
        (status = 201, description = "New branch created", body = ChatMessage),
        (status = 404, description = "Session or message not found")
    )
)]
pub async fn fork(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ForkRequest>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    let message = state
        .services
        .conversations()
        .fork(
            current_user.id,
            id,
            payload.from_message_id,
            Author::User {
                name: current_user.display_name(),
            },
            payload.content,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Make the path to a message the displayed conversation
#[utoipa::path(
    post,
    path = "/chat/sessions/{id}/branch",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = SwitchBranchRequest,
    responses(
        (status = 200, description = "New active path", body = ConversationPath),
        (status = 404, description = "Session or message not found")
    )
)]
pub async fn switch_branch(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SwitchBranchRequest>,
) -> AppResult<Json<ConversationPath>> {
    let conversation_path = state
        .services
        .conversations()
        .switch_branch(current_user.id, id, payload.target_message_id)
        .await?;
    Ok(Json(ConversationPath { conversation_path }))
}
