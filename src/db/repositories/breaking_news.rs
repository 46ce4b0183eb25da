//! Breaking-news repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{BreakingNews, BreakingNewsRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const NEWS_SELECT: &str = r#"
    SELECT b.id, b.title, b.post_id, b.url, b.active, b.priority,
           p.slug AS post_slug, p.published AS post_published,
           b.created_at, b.updated_at
    FROM breaking_news b
    LEFT JOIN posts p ON p.id = b.post_id
"#;

const NEWS_ORDER: &str = "ORDER BY b.priority DESC, b.created_at DESC, b.id DESC";

#[async_trait]
pub trait BreakingNewsRepository: Send + Sync {
    async fn create(&self, item: &BreakingNewsRecord) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<Option<BreakingNews>>;

    /// Items by priority then recency; `active_only` hides switched-off items
    async fn list(&self, active_only: bool) -> Result<Vec<BreakingNews>>;

    async fn update(&self, id: i64, item: &BreakingNewsRecord) -> Result<bool>;

    async fn set_active(&self, id: i64, active: bool) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_active(&self) -> Result<i64>;
}

pub struct SqlxBreakingNewsRepository {
    pool: DynDatabasePool,
}

impl SqlxBreakingNewsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BreakingNewsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BreakingNewsRepository for SqlxBreakingNewsRepository {
    async fn create(&self, item: &BreakingNewsRecord) -> Result<i64> {
        let now = Utc::now();
        let sql = "INSERT INTO breaking_news (title, post_id, url, active, priority, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?, ?, ?)";

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(&item.title)
                .bind(item.post_id)
                .bind(&item.url)
                .bind(item.active)
                .bind(item.priority)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create breaking news")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(&item.title)
                .bind(item.post_id)
                .bind(&item.url)
                .bind(item.active)
                .bind(item.priority)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create breaking news")?
                .last_insert_id() as i64,
        };
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<BreakingNews>> {
        let sql = format!("{} WHERE b.id = ?", NEWS_SELECT);
        let item = on_backend!(self.pool, p => sqlx::query_as::<_, BreakingNews>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get breaking news")?;
        Ok(item.map(BreakingNews::with_link))
    }

    async fn list(&self, active_only: bool) -> Result<Vec<BreakingNews>> {
        let sql = format!("{} WHERE (? = 0 OR b.active = ?) {}", NEWS_SELECT, NEWS_ORDER);
        let items = on_backend!(self.pool, p => sqlx::query_as::<_, BreakingNews>(&sql)
            .bind(active_only as i32)
            .bind(true)
            .fetch_all(p)
            .await)
        .context("Failed to list breaking news")?;
        Ok(items.into_iter().map(BreakingNews::with_link).collect())
    }

    async fn update(&self, id: i64, item: &BreakingNewsRecord) -> Result<bool> {
        let sql = "UPDATE breaking_news SET title = ?, post_id = ?, url = ?, active = ?, priority = ?, updated_at = ? \
                   WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(&item.title)
            .bind(item.post_id)
            .bind(&item.url)
            .bind(item.active)
            .bind(item.priority)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update breaking news")?;
        Ok(affected > 0)
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        let sql = "UPDATE breaking_news SET active = ?, updated_at = ? WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to toggle breaking news")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM breaking_news WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete breaking news")?;
        Ok(affected > 0)
    }

    async fn count_active(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM breaking_news WHERE active = ?",
        )
        .bind(true)
        .fetch_one(p)
        .await)
        .context("Failed to count breaking news")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::{PostRepository, SqlxPostRepository};
    use crate::models::PostRecord;

    fn record(title: &str, priority: i32, active: bool) -> BreakingNewsRecord {
        BreakingNewsRecord {
            title: title.to_string(),
            post_id: None,
            url: None,
            active,
            priority,
        }
    }

    #[tokio::test]
    async fn test_list_orders_by_priority_and_filters_inactive() {
        let repo = SqlxBreakingNewsRepository::new(migrated_pool().await);
        repo.create(&record("Low", 1, true)).await.unwrap();
        repo.create(&record("High", 10, true)).await.unwrap();
        repo.create(&record("Hidden", 50, false)).await.unwrap();

        let active = repo.list(true).await.unwrap();
        let titles: Vec<_> = active.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["High", "Low"]);

        let all = repo.list(false).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "Hidden");
        assert_eq!(repo.count_active().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_link_resolves_through_post() {
        let pool = migrated_pool().await;
        let author = insert_user(&pool, "desk@example.com", "editor").await;
        let posts = SqlxPostRepository::new(pool.clone());
        let post_id = posts
            .create(
                &PostRecord {
                    title: "Flood update".to_string(),
                    slug: "flood-update".to_string(),
                    excerpt: None,
                    content: "Body".to_string(),
                    cover_image: None,
                    published: true,
                    highlight: false,
                    published_at: Some(Utc::now()),
                    category_id: None,
                },
                author,
            )
            .await
            .unwrap();

        let repo = SqlxBreakingNewsRepository::new(pool);
        let mut item = record("Rivers rising", 0, true);
        item.post_id = Some(post_id);
        let id = repo.create(&item).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.link.as_deref(), Some("/posts/flood-update"));

        // deleting the post detaches the ticker item
        posts.delete(post_id).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.post_id, None);
        assert_eq!(fetched.link, None);
    }

    #[tokio::test]
    async fn test_toggle_update_delete() {
        let repo = SqlxBreakingNewsRepository::new(migrated_pool().await);
        let id = repo.create(&record("Ticker", 0, true)).await.unwrap();

        assert!(repo.set_active(id, false).await.unwrap());
        assert!(!repo.get_by_id(id).await.unwrap().unwrap().active);

        let mut changed = record("Ticker updated", 5, true);
        changed.url = Some("https://example.com/live".to_string());
        assert!(repo.update(id, &changed).await.unwrap());
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.priority, 5);
        assert_eq!(fetched.link.as_deref(), Some("https://example.com/live"));

        assert!(repo.delete(id).await.unwrap());
        assert!(repo.get_by_id(id).await.unwrap().is_none());
    }
}
