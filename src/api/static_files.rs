//! Static file serving
//!
//! `/static/*` is served from the active theme's `static/` directory when
//! the file exists there, otherwise from the assets embedded at build time.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use rust_embed::RustEmbed;
use tokio::fs;

use crate::api::middleware::AppState;

/// Built-in stylesheet and images
#[derive(RustEmbed)]
#[folder = "static/"]
struct StaticAssets;

/// GET /static/{*path}
pub async fn serve_static(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    if path.split('/').any(|part| part == ".." || part.is_empty()) {
        return not_found();
    }

    let theme_file = {
        let engine = match state.theme_engine.read() {
            Ok(engine) => engine,
            Err(_) => return not_found(),
        };
        (engine.get_current_theme() != "default").then(|| {
            engine
                .get_theme_path(engine.get_current_theme())
                .join("static")
                .join(&path)
        })
    };

    if let Some(file) = theme_file {
        if let Ok(contents) = fs::read(&file).await {
            return build_response(&path, contents);
        }
    }

    match StaticAssets::get(&path) {
        Some(content) => build_response(&path, content.data.into_owned()),
        None => not_found(),
    }
}

fn build_response(path: &str, data: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(get_content_type(path)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=3600"),
    );
    response
}

fn not_found() -> Response {
    let mut response = Response::new(Body::from("Not Found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Content type from the file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::test_app;

    #[test]
    fn test_content_types() {
        assert_eq!(get_content_type("style.css"), "text/css; charset=utf-8");
        assert_eq!(get_content_type("img/logo.svg"), "image/svg+xml");
        assert_eq!(get_content_type("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_serves_embedded_stylesheet() {
        let app = test_app(None).await;
        let response = app.server.get("/static/style.css").await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "text/css; charset=utf-8");
        assert!(!response.text().is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_traversal_paths_are_404() {
        let app = test_app(None).await;
        app.server
            .get("/static/missing.css")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .get("/static/../Cargo.toml")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
