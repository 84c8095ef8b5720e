//! Credential service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use auth::routes::{create_router, AppState};
use auth::token::TokenKeys;
use storage::PgUserStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting credential service");

    let database_url = common::config::database_url();
    let port = common::config::auth_port();

    let pool = storage::connect(&database_url).await?;
    storage::migrate(&pool).await?;
    info!("Connected to Postgres");

    let state = Arc::new(AppState {
        users: Arc::new(PgUserStore::new(pool)),
        keys: TokenKeys::new(&common::config::jwt_secret()),
    });

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Credential service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(common::signal::shutdown_signal())
        .await?;

    info!("Credential service stopped");
    Ok(())
}
