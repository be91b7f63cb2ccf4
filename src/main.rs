use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_sync::api::router;
use portfolio_sync::config::AppConfig;
use portfolio_sync::curriculum::{
    CourseCatalog, CurriculumSelectionSource, InMemorySelectionSource, RealtimeSelectionClient,
    StaticCourseCatalog,
};
use portfolio_sync::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "portfolio_sync=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let connect_options = config
        .database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let selection: Arc<dyn CurriculumSelectionSource> = match config.realtime.clone() {
        Some(realtime) => {
            info!("Reading course selections from {}", realtime.base_url);
            Arc::new(RealtimeSelectionClient::new(realtime)?)
        }
        None => {
            info!("SELECTION_BASE_URL not set, using in-memory course selections");
            Arc::new(InMemorySelectionSource::new())
        }
    };

    let catalog: Arc<dyn CourseCatalog> = match &config.course_catalog_path {
        Some(path) => Arc::new(StaticCourseCatalog::from_path(path)?),
        None => Arc::new(StaticCourseCatalog::new()),
    };

    let state = AppState::new(
        pool,
        selection,
        catalog,
        config.sync_debounce,
        config.starter_grace,
    );

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
