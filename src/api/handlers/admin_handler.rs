//! Admin console handlers. Mounted behind the admin gate.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{UserResponse, UserStats};
use crate::errors::AppResult;
use crate::types::{MessageResponse, PaginationMeta, PaginationParams};

/// Page of accounts
#[derive(Debug, Serialize, ToSchema)]
pub struct UserPage {
    pub data: Vec<UserResponse>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeRoleRequest {
    #[validate(length(min = 1, message = "Role is required"))]
    #[schema(example = "user")]
    pub role: String,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/approve", put(approve_admin))
        .route("/users/:id/role", put(change_role))
        .route("/stats", get(stats))
}

/// List accounts, newest first
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "One page of users", body = UserPage),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<UserPage>> {
    let page = state
        .services
        .admin()
        .list_users(params)
        .await?
        .map(UserResponse::from);

    Ok(Json(UserPage {
        data: page.data,
        meta: page.meta,
    }))
}

/// Approve a pending admin account
#[utoipa::path(
    put,
    path = "/admin/users/{id}/approve",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Admin approved", body = UserResponse),
        (status = 400, description = "Not an admin, or already approved"),
        (status = 404, description = "User not found")
    )
)]
pub async fn approve_admin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.admin().approve_admin(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Permanently delete an account and its chats
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Cannot delete yourself"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .admin()
        .delete_user(current_user.id, id)
        .await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// Change a user's role and sign them out everywhere
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "User not found")
    )
)]
pub async fn change_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ChangeRoleRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .services
        .admin()
        .change_role(id, payload.role)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// Account counts for the dashboard
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "User statistics", body = UserStats))
)]
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<UserStats>> {
    Ok(Json(state.services.admin().stats().await?))
}
