//! User repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, NewUser, User, UserFilter, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::like_pattern;

const USER_COLUMNS: &str = "id, name, email, email_verified, image, role, banned, ban_reason, \
                            ban_expires, created_at, updated_at";

const USER_FILTER: &str = "(? IS NULL OR name LIKE ? ESCAPE '!' OR email LIKE ? ESCAPE '!') \
                           AND (? IS NULL OR role = ?)";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Case-insensitive lookup
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)>;

    async fn count(&self) -> Result<i64>;

    async fn count_by_role(&self, role: UserRole) -> Result<i64>;

    async fn update_profile(&self, id: i64, name: &str, image: Option<&str>) -> Result<bool>;

    async fn update_role(&self, id: i64, role: UserRole) -> Result<bool>;

    /// Set or clear the ban columns
    async fn set_ban(
        &self,
        id: i64,
        banned: bool,
        reason: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Delete a user; accounts, sessions and posts cascade
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let email = user.email.trim().to_lowercase();
        let sql = "INSERT INTO users (name, email, email_verified, image, role, banned, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(&user.name)
                .bind(&email)
                .bind(false)
                .bind(&user.image)
                .bind(user.role.as_str())
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create user")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(&user.name)
                .bind(&email)
                .bind(false)
                .bind(&user.image)
                .bind(user.role.as_str())
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create user")?
                .last_insert_id() as i64,
        };

        Ok(User {
            id,
            name: user.name.clone(),
            email,
            email_verified: false,
            image: user.image.clone(),
            role: user.role,
            banned: false,
            ban_reason: None,
            ban_expires: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = on_backend!(self.pool, p => sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get user by ID")?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let email = email.trim().to_lowercase();
        let user = on_backend!(self.pool, p => sqlx::query_as::<_, User>(&sql)
            .bind(&email)
            .fetch_optional(p)
            .await)
        .context("Failed to get user by email")?;
        Ok(user)
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let search = filter.search.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern);
        let role = filter.role.map(UserRole::as_str);

        let list_sql = format!(
            "SELECT {} FROM users WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS, USER_FILTER
        );
        let count_sql = format!("SELECT COUNT(*) FROM users WHERE {}", USER_FILTER);

        let users = on_backend!(self.pool, p => sqlx::query_as::<_, User>(&list_sql)
            .bind(&search)
            .bind(&search)
            .bind(&search)
            .bind(role)
            .bind(role)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(p)
            .await)
        .context("Failed to list users")?;

        let total = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(&search)
            .bind(&search)
            .bind(&search)
            .bind(role)
            .bind(role)
            .fetch_one(p)
            .await)
        .context("Failed to count users")?;

        Ok((users, total))
    }

    async fn count(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(p)
            .await)
        .context("Failed to count users")?;
        Ok(count)
    }

    async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE role = ?",
        )
        .bind(role.as_str())
        .fetch_one(p)
        .await)
        .context("Failed to count users by role")?;
        Ok(count)
    }

    async fn update_profile(&self, id: i64, name: &str, image: Option<&str>) -> Result<bool> {
        let sql = "UPDATE users SET name = ?, image = ?, updated_at = ? WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(name)
            .bind(image)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update user profile")?;
        Ok(affected > 0)
    }

    async fn update_role(&self, id: i64, role: UserRole) -> Result<bool> {
        let sql = "UPDATE users SET role = ?, updated_at = ? WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update user role")?;
        Ok(affected > 0)
    }

    async fn set_ban(
        &self,
        id: i64,
        banned: bool,
        reason: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let sql = "UPDATE users SET banned = ?, ban_reason = ?, ban_expires = ?, updated_at = ? WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(banned)
            .bind(reason)
            .bind(expires)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update user ban")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete user")?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;
    use chrono::Duration;

    fn new_user(name: &str, email: &str, role: UserRole) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let repo = SqlxUserRepository::new(migrated_pool().await);

        let created = repo
            .create(&new_user("Desk Editor", "Desk@Example.com", UserRole::Editor))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert_eq!(created.email, "desk@example.com");

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.role, UserRole::Editor);
        assert!(!by_id.banned);

        let by_email = repo.get_by_email("DESK@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = SqlxUserRepository::new(migrated_pool().await);
        repo.create(&new_user("A", "same@example.com", UserRole::User)).await.unwrap();
        assert!(repo.create(&new_user("B", "same@example.com", UserRole::User)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let repo = SqlxUserRepository::new(migrated_pool().await);
        repo.create(&new_user("Alice Admin", "alice@example.com", UserRole::Admin)).await.unwrap();
        repo.create(&new_user("Bob Editor", "bob@example.com", UserRole::Editor)).await.unwrap();
        repo.create(&new_user("Carol Reader", "carol@example.com", UserRole::User)).await.unwrap();

        let (all, total) = repo.list(&UserFilter::default(), &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 2);

        let editors = UserFilter {
            role: Some(UserRole::Editor),
            ..Default::default()
        };
        let (found, total) = repo.list(&editors, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].name, "Bob Editor");

        let search = UserFilter {
            search: Some("carol".to_string()),
            ..Default::default()
        };
        let (found, _) = repo.list(&search, &ListParams::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "carol@example.com");
    }

    #[tokio::test]
    async fn test_role_ban_and_delete() {
        let repo = SqlxUserRepository::new(migrated_pool().await);
        let user = repo.create(&new_user("Dan", "dan@example.com", UserRole::User)).await.unwrap();

        assert!(repo.update_role(user.id, UserRole::Editor).await.unwrap());
        assert_eq!(repo.count_by_role(UserRole::Editor).await.unwrap(), 1);

        let expires = Utc::now() + Duration::days(3);
        assert!(repo.set_ban(user.id, true, Some("spam"), Some(expires)).await.unwrap());
        let banned = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(banned.banned);
        assert_eq!(banned.ban_reason.as_deref(), Some("spam"));
        assert!(banned.ban_expires.is_some());

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
