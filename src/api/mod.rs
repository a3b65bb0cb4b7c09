//! API layer - HTTP handlers and routing
//!
//! This module contains every HTTP endpoint of the blog:
//! - Server-rendered HTML pages (home, topics, posts, photo contest)
//! - Public JSON API under `/api/v1`
//! - Token-protected admin API under `/api/v1/admin`
//! - Embedded static assets and uploaded media

pub mod admin;
pub mod common;
pub mod middleware;
pub mod pages;
pub mod static_files;
pub mod topics;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = admin::router().route_layer(axum_middleware::from_fn_with_state(
        state,
        middleware::require_admin,
    ));

    topics::router().nest("/admin", admin_routes)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin.trim() == "*" {
        return cors.allow_origin(AllowOrigin::any());
    }

    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .merge(pages::router())
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/static/{*path}", get(static_files::serve_static))
        .nest_service("/media", ServeDir::new(&config.upload.path))
        .fallback(pages::not_found)
        .layer(DefaultBodyLimit::max(config.upload.body_limit()))
        .layer(cors_layer(&config.server.cors_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
