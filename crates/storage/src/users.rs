//! User repository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// bcrypt hash, never the plaintext.
    pub password: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user and return its row id. Callers hash the password first.
    async fn create(&self, username: &str, password_hash: &str) -> Result<i64>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, username: &str, password_hash: &str) -> Result<i64> {
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO users (username, password) VALUES ($1, $2) RETURNING id")
                .bind(username)
                .bind(password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(|err| {
                    if let sqlx::Error::Database(db) = &err {
                        if db.code().as_deref() == Some("23505") {
                            return StoreError::DuplicateUsername(username.to_string());
                        }
                    }
                    StoreError::Database(err)
                })?;
        Ok(id)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, username, password FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}
