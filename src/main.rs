use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use abe_portal_backend::config;
use abe_portal_backend::enumber::EnumberCodec;
use abe_portal_backend::paperless::{DocumentStore, PaperlessClient};
use abe_portal_backend::search::DbIndex;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "abe_portal_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to load configuration")?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url = app_config.database_url_with_env();
    let db_index = DbIndex::open(&database_url).await?;
    db_index.init().await?;

    let codec = Arc::new(EnumberCodec::new()?);
    tracing::info!("E-number grammars: {:?}", codec.grammar_names());

    let paperless = PaperlessClient::new(
        &app_config.paperless.base_url,
        &app_config.paperless.api_token,
        Duration::from_secs(app_config.paperless.timeout_secs),
    )?;
    if app_config.paperless.api_token.is_empty() {
        tracing::warn!("Paperless API token is not configured");
    }
    let documents: Arc<dyn DocumentStore> = Arc::new(paperless);

    let bind_addr = app_config.get_bind_address();
    let state = Arc::new(AppState::new(app_config, db_index, documents, codec));

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
