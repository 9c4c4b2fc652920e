//! Operations addressed by message id.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::session_handler::ConversationPath;
use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::errors::AppResult;
use crate::services::EditedMessage;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedMessages {
    /// The message and all of its descendants
    pub deleted: u64,
}

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", put(edit_message).delete(delete_message))
        .route("/:id/branch", get(conversation_branch))
}

/// Root-to-message path of any message
#[utoipa::path(
    get,
    path = "/chat/messages/{id}/branch",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Path ending at the message", body = ConversationPath),
        (status = 404, description = "Message not found")
    )
)]
pub async fn conversation_branch(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConversationPath>> {
    let conversation_path = state
        .services
        .conversations()
        .conversation_branch(current_user.id, id)
        .await?;
    Ok(Json(ConversationPath { conversation_path }))
}

/// Edit a message by adding a sibling with the new content and switching to it
#[utoipa::path(
    put,
    path = "/chat/messages/{id}",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Message ID")),
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Edited copy and the new active path", body = EditedMessage),
        (status = 404, description = "Message not found")
    )
)]
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<EditMessageRequest>,
) -> AppResult<Json<EditedMessage>> {
    let edited = state
        .services
        .conversations()
        .edit_message(current_user.id, id, payload.content)
        .await?;
    Ok(Json(edited))
}

/// Delete a message and everything below it
#[utoipa::path(
    delete,
    path = "/chat/messages/{id}",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Subtree deleted", body = DeletedMessages),
        (status = 404, description = "Message not found")
    )
)]
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedMessages>> {
    let deleted = state
        .services
        .conversations()
        .delete_message(current_user.id, id)
        .await?;
    Ok(Json(DeletedMessages { deleted }))
}
