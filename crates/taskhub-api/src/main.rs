//! taskhub account API server entry point.

use std::sync::Arc;

use taskhub_api::{
    config::ApiConfig,
    db::{connect_and_migrate, PgIdentityStore},
    router::{build_router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = ApiConfig::from_env()?;
    let pool = connect_and_migrate(&config.database_url).await?;
    let state = AppState::new(Arc::new(PgIdentityStore::new(pool)), &config.auth)?;
    let app = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
