use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telehealth_server::config::{AppConfig, StoreBackend};
use telehealth_server::db::migrations::run_migrations;
use telehealth_server::db::{Database, PgDocumentStore};
use telehealth_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let db = match config.store {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&config.database.connection_string())
                .await
                .context("failed to connect to Postgres")?;
            run_migrations(&pool).await.context("migrations failed")?;
            Database::new(Arc::new(PgDocumentStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Database::in_memory()
        }
    };

    let address = config.bind_address();
    let environment = config.environment.clone();
    let state = AppState::new(config, db)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, %environment, "telehealth server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
