//! Contact message repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateMessageInput, ListParams, Message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const MESSAGE_COLUMNS: &str = "id, name, email, phone, subject, content, is_read, created_at";

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &CreateMessageInput) -> Result<Message>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>>;

    /// Newest first, optionally only read or unread messages
    async fn list(&self, read: Option<bool>, params: &ListParams) -> Result<(Vec<Message>, i64)>;

    async fn set_read(&self, id: i64, read: bool) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_unread(&self) -> Result<i64>;
}

pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, message: &CreateMessageInput) -> Result<Message> {
        let now = Utc::now();
        let name = message.name.trim();
        let email = message.email.trim();
        let phone = message.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let subject = message.subject.trim();
        let content = message.content.trim();
        let sql = "INSERT INTO messages (name, email, phone, subject, content, is_read, created_at) \
                   VALUES (?, ?, ?, ?, ?, ?, ?)";

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(name)
                .bind(email)
                .bind(phone)
                .bind(subject)
                .bind(content)
                .bind(false)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create message")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(name)
                .bind(email)
                .bind(phone)
                .bind(subject)
                .bind(content)
                .bind(false)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create message")?
                .last_insert_id() as i64,
        };

        Ok(Message {
            id,
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            subject: subject.to_string(),
            content: content.to_string(),
            is_read: false,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {} FROM messages WHERE id = ?", MESSAGE_COLUMNS);
        let message = on_backend!(self.pool, p => sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get message")?;
        Ok(message)
    }

    async fn list(&self, read: Option<bool>, params: &ListParams) -> Result<(Vec<Message>, i64)> {
        let list_sql = format!(
            "SELECT {} FROM messages WHERE (? IS NULL OR is_read = ?) \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            MESSAGE_COLUMNS
        );
        let count_sql = "SELECT COUNT(*) FROM messages WHERE (? IS NULL OR is_read = ?)";

        let messages = on_backend!(self.pool, p => sqlx::query_as::<_, Message>(&list_sql)
            .bind(read)
            .bind(read)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(p)
            .await)
        .context("Failed to list messages")?;

        let total = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(count_sql)
            .bind(read)
            .bind(read)
            .fetch_one(p)
            .await)
        .context("Failed to count messages")?;

        Ok((messages, total))
    }

    async fn set_read(&self, id: i64, read: bool) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("UPDATE messages SET is_read = ? WHERE id = ?")
            .bind(read)
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update message")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete message")?;
        Ok(affected > 0)
    }

    async fn count_unread(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE is_read = ?",
        )
        .bind(false)
        .fetch_one(p)
        .await)
        .context("Failed to count unread messages")?;
        Ok(count)
    }
}
