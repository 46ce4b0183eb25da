//! API layer - HTTP handlers and routing
//!
//! Everything lives under `/api`:
//! - public reading: posts, categories, breaking news, health
//! - the public contact form
//! - session endpoints under `/auth`
//! - the staff dashboard under `/admin` (users are admin only)

pub mod auth;
pub mod breaking_news;
pub mod categories;
pub mod common;
pub mod dashboard;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod upload;
pub mod users;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::config::{Config, StorageDriver};

pub use middleware::{ApiError, AppState, AuthenticatedUser, ClientInfo};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the router mounted at `/api`
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let upload_limit = usize::try_from(state.uploads.max_file_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // Admins and editors; finer checks happen per handler
    let staff_routes = Router::new()
        .nest("/posts", posts::admin_router())
        .nest("/categories", categories::admin_router())
        .nest("/breaking-news", breaking_news::admin_router())
        .nest("/messages", messages::admin_router())
        .nest(
            "/upload",
            upload::router().layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest("/dashboard", dashboard::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_staff,
        ));

    let admin_routes = Router::new()
        .nest("/users", users::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    let auth_routes = auth::public_router().merge(auth::protected_router().route_layer(
        axum_middleware::from_fn_with_state(state, middleware::require_auth),
    ));

    Router::new()
        .route("/health", get(dashboard::health))
        .nest("/posts", posts::public_router())
        .nest("/categories", categories::public_router())
        .nest("/breaking-news", breaking_news::public_router())
        .nest("/messages", messages::public_router())
        .nest("/auth", auth_routes)
        .nest("/admin", staff_routes.merge(admin_routes))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let origin = config
        .server
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", config.server.cors_origin))?;

    // Credentials are allowed so the dashboard can send the session cookie
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let mut router = Router::new()
        .nest("/api", build_api_router(state.clone()))
        .fallback(|| async { ApiError::not_found("Route not found") });

    let local = &config.storage.local;
    let mount = local.public_base_url.trim_end_matches('/');
    if config.storage.driver == StorageDriver::Local && mount.starts_with('/') {
        router = router.nest_service(mount, ServeDir::new(&local.path));
    }

    Ok(router
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
