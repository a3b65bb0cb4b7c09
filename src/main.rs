//! MTG Blog server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mtg_blog::{
    api::{self, AppState},
    config::Config,
    db,
    services::SystemClock,
    theme::ThemeEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mtg_blog=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MTG blog...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    tokio::fs::create_dir_all(config.upload.contest_path()).await?;

    let theme_engine = ThemeEngine::new(&config.theme.path, &config.theme.active)?;
    tracing::info!("Theme: {}", theme_engine.get_current_theme());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(pool, config, Arc::new(SystemClock), theme_engine);
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
