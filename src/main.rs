use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tarasul::{
    auth::jwt::JwtService,
    config::AppConfig,
    db, routes, seed,
    state::AppState,
    storage::{AttachmentStore, LocalStorage},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    {
        let mut conn = pool.get().context("failed to acquire connection")?;
        db::run_migrations(&mut conn)?;
        seed::run(&mut conn, &config.admin_password)?;
    }

    let storage: Arc<dyn AttachmentStore> = Arc::new(LocalStorage::new(&config.upload_dir)?);
    let jwt = JwtService::from_config(&config)?;

    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    let state = AppState::new(pool, config, storage, jwt);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind((server_host.as_str(), server_port))
        .await
        .with_context(|| format!("failed to bind {server_host}:{server_port}"))?;
    info!(host = %server_host, port = server_port, "listening");

    axum::serve(listener, router)
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}
