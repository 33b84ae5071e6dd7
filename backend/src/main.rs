use anyhow::Context;
use backend::{
    auth::SessionKeys,
    config::{Config, StoreKind},
    store::{RedisTaskStore, TaskStore},
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = match config.store {
        StoreKind::Redis => TaskStore::Redis(
            RedisTaskStore::connect(&config.redis_url)
                .await
                .context("failed to connect to Redis")?,
        ),
        StoreKind::Memory => {
            tracing::warn!("using in-memory task store; tasks are lost on restart");
            TaskStore::memory()
        }
    };

    let state = AppState::new(store, SessionKeys::from_secret(config.session_secret.as_bytes()));
    let app = backend::app(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, store = ?config.store, "task server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
