//! Chatbot handlers: send, stream, linear history and stats.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{message_routes, session_routes};
use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{ChatStats, HistoryEntry};
use crate::errors::{AppError, AppResult};
use crate::services::{ChatReply, ChatRequest};

const SESSION_ID_HEADER: &str = "x-session-id";
const USER_MESSAGE_ID_HEADER: &str = "x-user-message-id";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChatMessageRequest {
    #[validate(length(min = 1, message = "Message is required"))]
    #[schema(example = "How do I reverse a list in Rust?")]
    pub message: String,
    /// Defaults to the most recently used session
    pub session_id: Option<Uuid>,
    /// Reply under this message instead of the end of the active path
    pub parent_id: Option<Uuid>,
}

impl From<ChatMessageRequest> for ChatRequest {
    fn from(req: ChatMessageRequest) -> Self {
        Self {
            message: req.message,
            session_id: req.session_id,
            parent_id: req.parent_id,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of messages, 50 by default, at most 200
    pub limit: Option<u64>,
}

/// Everything under `/chat`
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(send_message))
        .route("/stream", post(stream_message))
        .route("/history", get(history))
        .route("/stats", get(stats))
        .nest("/sessions", session_routes())
        .nest("/messages", message_routes())
}

/// Send a message and wait for the whole reply
#[utoipa::path(
    post,
    path = "/chat",
    tag = "Chat",
    security(("bearer_auth" = [])),
    request_body = ChatMessageRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatReply),
        (status = 400, description = "Empty message"),
        (status = 404, description = "Session or parent not found")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<ChatMessageRequest>,
) -> AppResult<Json<ChatReply>> {
    let reply = state
        .services
        .chat()
        .send(current_user.id, current_user.display_name(), payload.into())
        .await?;
    Ok(Json(reply))
}

/// Send a message and stream the reply as plain text
#[utoipa::path(
    post,
    path = "/chat/stream",
    tag = "Chat",
    security(("bearer_auth" = [])),
    request_body = ChatMessageRequest,
    responses(
        (status = 200, description = "Reply text, chunk by chunk", content_type = "text/plain", body = String),
        (status = 400, description = "Empty message"),
        (status = 404, description = "Session or parent not found")
    )
)]
pub async fn stream_message(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<ChatMessageRequest>,
) -> AppResult<Response> {
    let reply = state
        .services
        .chat()
        .stream(current_user.id, current_user.display_name(), payload.into())
        .await?;

    let body = Body::from_stream(reply.chunks.map(Ok::<_, Infallible>));
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(SESSION_ID_HEADER, id_header(reply.session_id)?);
    headers.insert(USER_MESSAGE_ID_HEADER, id_header(reply.user_message_id)?);

    Ok(response)
}

fn id_header(id: Uuid) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&id.to_string()).map_err(|e| AppError::internal(e.to_string()))
}

/// Latest messages of the current session, oldest first
#[utoipa::path(
    get,
    path = "/chat/history",
    tag = "Chat",
    security(("bearer_auth" = [])),
    params(HistoryQuery),
    responses((status = 200, description = "Linear history", body = [HistoryEntry]))
)]
pub async fn history(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<HistoryEntry>>> {
    let entries = state
        .services
        .sessions()
        .history(current_user.id, query.limit)
        .await?;
    Ok(Json(entries))
}

/// Totals for the signed-in user
#[utoipa::path(
    get,
    path = "/chat/stats",
    tag = "Chat",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Chat statistics", body = ChatStats))
)]
pub async fn stats(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ChatStats>> {
    Ok(Json(state.services.sessions().stats(current_user.id).await?))
}
