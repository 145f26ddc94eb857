//! Chat persistence
//!
//! Chats are stored whole: one JSON document per (user, chat id), replaced on
//! every save. There is no partial update protocol.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::conversation::{Conversation, Message};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt chat record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Whole-record chat storage keyed by user and chat id
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Chat ids for a user, most recently updated first
    async fn list_chat_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    async fn load_chat(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Option<Conversation>, StoreError>;

    async fn save_chat(&self, user_id: &str, chat: &Conversation) -> Result<(), StoreError>;
}

/// SQLite-backed chat store
pub struct SqliteChatStore {
    pool: SqlitePool,
}

impl SqliteChatStore {
    /// Open (or create) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store, used by tests
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        // A single connection that never expires, or the database vanishes.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                user_id TEXT NOT NULL,
                chat_id TEXT NOT NULL,
                record TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, chat_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_chats_user_updated
            ON chats(user_id, updated_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn list_chat_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT chat_id FROM chats
            WHERE user_id = ?
            ORDER BY updated_at DESC, chat_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn load_chat(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT record FROM chats WHERE user_id = ? AND chat_id = ?
            "#,
        )
        .bind(user_id)
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((record,)) => Ok(Some(serde_json::from_str(&record)?)),
            None => Ok(None),
        }
    }

    async fn save_chat(&self, user_id: &str, chat: &Conversation) -> Result<(), StoreError> {
        let record = serde_json::to_string(chat)?;
        // Fixed-width UTC timestamps sort correctly as text.
        let updated_at = chat.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO chats (user_id, chat_id, record, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, chat_id)
            DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&chat.id)
        .bind(record)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// The conversation store handed to request handlers.
///
/// Owns the persistence handle; every load and save goes through it explicitly.
#[derive(Clone)]
pub struct Conversations {
    store: Arc<dyn ChatStore>,
    max_stored_messages: Option<usize>,
}

impl Conversations {
    pub fn new(store: Arc<dyn ChatStore>, max_stored_messages: Option<usize>) -> Self {
        Self {
            store,
            max_stored_messages,
        }
    }

    /// All chats of a user, most recently updated first
    pub async fn list(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let ids = self.store.list_chat_ids(user_id).await?;

        let mut chats = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.load_chat(user_id, &id).await? {
                Some(chat) => chats.push(chat),
                None => tracing::warn!(user_id, chat_id = %id, "chat listed but not found"),
            }
        }
        Ok(chats)
    }

    /// Create and persist an empty chat
    pub async fn create(&self, user_id: &str) -> Result<Conversation, StoreError> {
        let mut chat = Conversation::new();
        self.save(user_id, &mut chat).await?;
        tracing::debug!(user_id, chat_id = %chat.id, "created chat");
        Ok(chat)
    }

    pub async fn open(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        self.store.load_chat(user_id, chat_id).await
    }

    /// Persist the whole record, trimming stored history if a cap is configured
    pub async fn save(&self, user_id: &str, chat: &mut Conversation) -> Result<(), StoreError> {
        if let Some(max) = self.max_stored_messages {
            chat.retain_latest(max);
        }
        self.store.save_chat(user_id, chat).await
    }

    /// Append one message and persist
    pub async fn append(
        &self,
        user_id: &str,
        chat: &mut Conversation,
        message: Message,
    ) -> Result<(), StoreError> {
        chat.push(message);
        self.save(user_id, chat).await
    }
}
