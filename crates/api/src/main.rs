use anyhow::{Context, Result};
use tracing::info;

use moldtrack_api::{app, config::Config, middleware};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    middleware::logging::init_logging(&config.logging)
        .context("Failed to initialize logging")?;
    middleware::init_metrics().context("Failed to install Prometheus recorder")?;

    info!("Starting moldtrack API v{}", env!("CARGO_PKG_VERSION"));

    let db_config = persistence::DatabaseConfig::from(&config.database);
    let pool = persistence::create_pool(&db_config).await?;

    info!("Running database migrations...");
    persistence::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations completed");

    let addr = config.socket_addr().context("Invalid server address")?;
    let app = app::create_app(config, pool);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
