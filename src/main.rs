use std::sync::{Arc, Mutex};

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use appointly::config::AppConfig;
use appointly::db;
use appointly::handlers;
use appointly::services::calendar::google::GoogleCalendarProvider;
use appointly::services::calendar::CalendarProvider;
use appointly::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let default_tz = config.default_tz()?;
    tracing::info!("default timezone: {default_tz}");

    let conn = db::init_db(&config.database_url)?;

    let calendar: Option<Box<dyn CalendarProvider>> = match config.calendar_provider.as_str() {
        "google" => {
            tracing::info!(
                "using Google Calendar provider (api: {})",
                config.google_calendar_api_base
            );
            Some(Box::new(GoogleCalendarProvider::new(
                config.google_calendar_api_base.clone(),
            )))
        }
        other => {
            tracing::info!(provider = other, "calendar integration disabled");
            None
        }
    };
    if config.api_token.is_empty() {
        tracing::warn!("API_TOKEN is empty, /api routes are unauthenticated");
    }

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        calendar,
    });

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
