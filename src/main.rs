use anyhow::Context;
use shpgate::{build_router, services::schema::Activity, AppConfig, AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting shapefile validation gateway...");

    let config = AppConfig::from_env();
    info!(
        "Storage root {:?}, upload limit {}, validation timeout {:?}",
        config.storage_root, config.max_upload_label, config.validation_timeout
    );

    let state = AppState::new(config);
    state
        .storage
        .ensure_buckets(Activity::labels())
        .await
        .context("Failed to prepare storage buckets")?;

    let bind_addr = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("shpgate=debug,tower_http=debug,axum=debug"));

    fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(filter)
        .init();
}
