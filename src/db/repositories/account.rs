//! Account repository
//!
//! Accounts hold login credentials. Email + password users have one
//! `credential` account whose `account_id` is the user id.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Account, CREDENTIAL_PROVIDER};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create_credential(&self, user_id: i64, password_hash: &str) -> Result<Account>;

    async fn get_credential(&self, user_id: i64) -> Result<Option<Account>>;

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<bool>;
}

pub struct SqlxAccountRepository {
    pool: DynDatabasePool,
}

impl SqlxAccountRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccountRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AccountRepository for SqlxAccountRepository {
    async fn create_credential(&self, user_id: i64, password_hash: &str) -> Result<Account> {
        let now = Utc::now();
        let account_id = user_id.to_string();
        let sql = "INSERT INTO accounts (user_id, provider_id, account_id, password_hash, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?, ?)";

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(user_id)
                .bind(CREDENTIAL_PROVIDER)
                .bind(&account_id)
                .bind(password_hash)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create credential account")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(user_id)
                .bind(CREDENTIAL_PROVIDER)
                .bind(&account_id)
                .bind(password_hash)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create credential account")?
                .last_insert_id() as i64,
        };

        Ok(Account {
            id,
            user_id,
            provider_id: CREDENTIAL_PROVIDER.to_string(),
            account_id,
            password_hash: Some(password_hash.to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_credential(&self, user_id: i64) -> Result<Option<Account>> {
        let sql = "SELECT id, user_id, provider_id, account_id, password_hash, created_at, updated_at \
                   FROM accounts WHERE user_id = ? AND provider_id = ?";
        let account = on_backend!(self.pool, p => sqlx::query_as::<_, Account>(sql)
            .bind(user_id)
            .bind(CREDENTIAL_PROVIDER)
            .fetch_optional(p)
            .await)
        .context("Failed to get credential account")?;
        Ok(account)
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<bool> {
        let sql = "UPDATE accounts SET password_hash = ?, updated_at = ? WHERE user_id = ? AND provider_id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .bind(CREDENTIAL_PROVIDER)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update password")?;
        Ok(affected > 0)
    }
}
