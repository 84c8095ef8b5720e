//! Postgres-backed repositories for users and messages.
//!
//! The services depend on the [`UserStore`] and [`MessageStore`] ports; the
//! `Pg*` types are the production implementations over a shared [`PgPool`].

pub mod error;
pub mod messages;
pub mod users;

pub use error::{Result, StoreError};
pub use messages::{MessageStore, NewMessage, PgMessageStore};
pub use users::{PgUserStore, User, UserStore};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Connect a pool to the given database.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
