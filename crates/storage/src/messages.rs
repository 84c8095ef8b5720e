//! Message repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// Row-to-be for the messages table. `author` is still a username here; the
/// insert resolves it to a `users.id` foreign key.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub room: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Idempotent on `id`: replaying the same message leaves a single row.
    async fn save(&self, message: &NewMessage) -> Result<()>;
}

pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn save(&self, message: &NewMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, room, author_id, body, created_at)
             VALUES ($1, $2, (SELECT id FROM users WHERE username = $3), $4, $5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(message.id)
        .bind(&message.room)
        .bind(&message.author)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
