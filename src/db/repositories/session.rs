//! Session repository

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const SESSION_COLUMNS: &str = "id, user_id, expires_at, ip_address, user_agent, created_at, updated_at";

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<()>;

    /// Look up a session by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Move the expiry forward and mark the session as used at `now`
    async fn touch(&self, id: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Revoke every session of a user, returning how many were removed
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Revoke every session of a user except `keep`
    async fn delete_by_user_except(&self, user_id: i64, keep: &str) -> Result<u64>;

    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<()> {
        let sql = "INSERT INTO sessions (id, user_id, expires_at, ip_address, user_agent, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?, ?, ?)";
        on_backend!(self.pool, p => sqlx::query(sql)
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .bind(&session.ip_address)
            .bind(&session.user_agent)
            .bind(session.created_at)
            .bind(session.updated_at)
            .execute(p)
            .await
            .map(|_| ()))
        .context("Failed to create session")?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS);
        let session = on_backend!(self.pool, p => sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get session")?;
        Ok(session)
    }

    async fn touch(&self, id: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        on_backend!(self.pool, p => sqlx::query(
            "UPDATE sessions SET expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(expires_at)
        .bind(now)
        .bind(id)
        .execute(p)
        .await
        .map(|_| ()))
        .context("Failed to refresh session")?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        on_backend!(self.pool, p => sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|_| ()))
        .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete user sessions")?;
        Ok(affected)
    }

    async fn delete_by_user_except(&self, user_id: i64, keep: &str) -> Result<u64> {
        let affected = on_backend!(self.pool, p => sqlx::query(
            "DELETE FROM sessions WHERE user_id = ? AND id <> ?",
        )
        .bind(user_id)
        .bind(keep)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))
        .context("Failed to delete other user sessions")?;
        Ok(affected)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete expired sessions")?;
        Ok(affected)
    }
}
