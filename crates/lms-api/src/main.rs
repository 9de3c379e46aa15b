use std::time::Duration;

use lms_api::api;
use lms_api::auth;
use lms_api::config::Config;
use lms_api::state::AppState;
use lms_api::sweeper::{RevocationSweeper, ThrottleSweeper};
use sea_orm_migration::MigratorTrait;

const REVOCATION_SWEEP_EVERY: Duration = Duration::from_secs(600);
const THROTTLE_SWEEP_EVERY: Duration = Duration::from_secs(60);

async fn init_db_and_migrate(config: &Config) -> anyhow::Result<sea_orm::DatabaseConnection> {
    let db = lms_db::connect(&config.database_url).await?;

    // Apply migrations on boot (idempotent).
    lms_migration::Migrator::up(&db, None).await?;

    if auth::ensure_admin_user(&db, config).await? {
        tracing::info!("bootstrap admin account created");
    }
    Ok(db)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let db = init_db_and_migrate(&config).await?;

    let addr = config.bind_addr;
    let environment = config.environment.clone();
    let state = AppState::new(db, config);

    RevocationSweeper::new(state.tokens.clone(), REVOCATION_SWEEP_EVERY).spawn();
    ThrottleSweeper::new(state.throttle.clone(), THROTTLE_SWEEP_EVERY).spawn();

    let app = api::router(state);
    tracing::info!(%addr, %environment, "lms-api HTTP listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
