pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod tenant;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use state::AppState;

/// Build the full application router.
///
/// Layer order, outermost first: CORS, tracing, authentication, tenant
/// context, then per-route the access guard.
pub fn app(state: AppState) -> Router {
    build_app(state, config::config())
}

fn build_app(state: AppState, config: &config::AppConfig) -> Router {
    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        .merge(tenant_routes())
        .merge(user_routes())
        .merge(automation_routes())
        .route_layer(from_fn(middleware::tenant_guard))
        .layer(from_fn(middleware::establish_tenant_context))
        .layer(from_fn(middleware::authenticate))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));
    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.layer(cors_layer(&config.security.cors_origins)).with_state(state)
}

fn public_routes() -> Router<AppState> {
    use handlers::public::{auth, plans, webhooks};

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/plans", get(plans::list))
        .route("/api/plans/:slug", get(plans::show))
        .route("/api/webhooks/n8n/execution", post(webhooks::n8n_execution))
}

fn tenant_routes() -> Router<AppState> {
    use handlers::protected::{auth, subscription, tenants};

    Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/plans/subscription", get(subscription::show))
        .route("/api/tenants/me", get(tenants::me).patch(tenants::update_me))
        .route("/api/tenants/me/stats", get(tenants::stats))
        .route("/api/tenants/:tenant_id", get(tenants::show))
}

fn user_routes() -> Router<AppState> {
    use handlers::protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/me", get(users::me).patch(users::update_me))
        .route(
            "/api/users/:id",
            get(users::show).patch(users::update).delete(users::remove),
        )
}

fn automation_routes() -> Router<AppState> {
    use handlers::protected::{automations, templates};

    Router::new()
        .route("/api/templates", get(templates::list))
        .route("/api/templates/:id", get(templates::show))
        .route("/api/automations", get(automations::list).post(automations::create))
        .route(
            "/api/automations/:id",
            get(automations::show)
                .patch(automations::update)
                .delete(automations::remove),
        )
        .route("/api/automations/:id/activate", post(automations::activate))
        .route("/api/automations/:id/deactivate", post(automations::deactivate))
        .route("/api/automations/:id/trigger", post(automations::trigger))
        .route("/api/automations/:id/executions", get(automations::executions))
        .route(
            "/api/automations/:id/executions/:execution_id",
            get(automations::execution),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "MooveLabs API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": "/api/auth/* (register, login and refresh are public)",
                "plans": "/api/plans[/:slug] (public)",
                "webhooks": "/api/webhooks/n8n/execution (workflow engine)",
                "tenants": "/api/tenants/* (protected)",
                "users": "/api/users/* (protected, OWNER/ADMIN for management)",
                "templates": "/api/templates[/:id] (protected)",
                "automations": "/api/automations/* (protected)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                    }
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::database::MemoryStore;
    use crate::workflow::fake::FakeEngine;

    fn test_state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), Arc::new(FakeEngine::default()))
    }

    fn test_app() -> Router {
        app(test_state())
    }

    async fn traced_health_check(enable_request_logging: bool) -> String {
        let mut config = config::config().clone();
        config.api.enable_request_logging = enable_request_logging;
        let (logs, _guard) = crate::test_support::capture_logs(tracing::Level::DEBUG);

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = build_app(test_state(), &config).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        logs.contents()
    }

    #[tokio::test]
    async fn request_logging_follows_config() {
        assert!(traced_health_check(true).await.contains("finished processing request"));
        assert!(!traced_health_check(false).await.contains("processing request"));
    }

    #[tokio::test]
    async fn guard_rejects_anonymous_requests() {
        let request = Request::builder().uri("/api/tenants/me").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_pings_the_store() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let request = Request::builder().uri("/api/nothing-here").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_echoes_allowed_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/plans")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:3000"))
        );
    }
}
