//! Application route configuration.

use axum::{extract::State, http::StatusCode, middleware, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{admin_routes, auth_routes, chat_routes, user_routes};
use super::middleware::{
    admin_middleware, auth_middleware, rate_limit_auth_middleware, rate_limit_middleware,
};
use super::openapi::ApiDoc;
use super::AppState;
use crate::errors::AppResult;

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    // Layers run bottom-up: rate limit, then session, then role
    let signed_in = |routes: Router<AppState>| {
        routes
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
    };

    let admin = admin_routes()
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        // Health check endpoints (no rate limiting)
        .route("/", get(root))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest(
            "/auth",
            auth_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_auth_middleware,
            )),
        )
        .nest("/users", signed_in(user_routes()))
        .nest("/chat", signed_in(chat_routes()))
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "treechat API"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    services: ServiceHealth,
}

#[derive(Serialize)]
struct ServiceHealth {
    database: ServiceStatus,
    redis: ServiceStatus,
}

#[derive(Serialize)]
struct ServiceStatus {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ServiceStatus {
    fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

impl From<AppResult<()>> for ServiceStatus {
    fn from(result: AppResult<()>) -> Self {
        match result {
            Ok(()) => Self {
                status: "healthy",
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = ?e, "Health probe failed");
                Self {
                    status: "unhealthy",
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Database and Redis connectivity
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, redis) = tokio::join!(state.health.database(), state.health.redis());
    let services = ServiceHealth {
        database: database.into(),
        redis: redis.into(),
    };

    let all_healthy = services.database.is_healthy() && services.redis.is_healthy();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if all_healthy { "healthy" } else { "degraded" },
            services,
        }),
    )
}
