//! Post repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, Post, PostFilter, PostRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::like_pattern;

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.excerpt, p.content, p.cover_image, p.published, p.highlight,
           p.published_at, p.views, p.author_id, u.name AS author_name, p.category_id,
           c.name AS category_name, c.slug AS category_slug, p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const POST_FILTER: &str = r#"
    WHERE (? IS NULL OR p.published = ?)
      AND (? IS NULL OR p.highlight = ?)
      AND (? IS NULL OR p.category_id = ?)
      AND (? IS NULL OR c.slug = ?)
      AND (? IS NULL OR p.author_id = ?)
      AND (? IS NULL OR p.title LIKE ? ESCAPE '!' OR p.excerpt LIKE ? ESCAPE '!')
      AND (? IS NULL OR p.id <> ?)
"#;

const POST_ORDER: &str = "ORDER BY COALESCE(p.published_at, p.created_at) DESC, p.id DESC";

/// Owned bind values for [`POST_FILTER`]
struct FilterBinds {
    published: Option<bool>,
    highlight: Option<bool>,
    category_id: Option<i64>,
    category_slug: Option<String>,
    author_id: Option<i64>,
    search: Option<String>,
    exclude_id: Option<i64>,
}

impl From<&PostFilter> for FilterBinds {
    fn from(filter: &PostFilter) -> Self {
        Self {
            published: filter.published,
            highlight: filter.highlight,
            category_id: filter.category_id,
            category_slug: filter.category_slug.clone(),
            author_id: filter.author_id,
            search: filter
                .search
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(like_pattern),
            exclude_id: filter.exclude_id,
        }
    }
}

macro_rules! bind_filter {
    ($query:expr, $f:expr) => {
        $query
            .bind($f.published)
            .bind($f.published)
            .bind($f.highlight)
            .bind($f.highlight)
            .bind($f.category_id)
            .bind($f.category_id)
            .bind(&$f.category_slug)
            .bind(&$f.category_slug)
            .bind($f.author_id)
            .bind($f.author_id)
            .bind(&$f.search)
            .bind(&$f.search)
            .bind(&$f.search)
            .bind($f.exclude_id)
            .bind($f.exclude_id)
    };
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post, returning its id
    async fn create(&self, post: &PostRecord, author_id: i64) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Whether another post (not `exclude_id`) already uses `slug`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Newest first
    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    async fn count(&self, filter: &PostFilter) -> Result<i64>;

    async fn update(&self, id: i64, post: &PostRecord) -> Result<bool>;

    async fn set_published(
        &self,
        id: i64,
        published: bool,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    async fn set_highlight(&self, id: i64, highlight: bool) -> Result<bool>;

    async fn increment_views(&self, id: i64) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(&self, clause: &str, value: PostKey<'_>) -> Result<Option<Post>> {
        let sql = format!("{} WHERE {}", POST_SELECT, clause);
        let post = match value {
            PostKey::Id(id) => on_backend!(self.pool, p => sqlx::query_as::<_, Post>(&sql)
                .bind(id)
                .fetch_optional(p)
                .await),
            PostKey::Slug(slug) => on_backend!(self.pool, p => sqlx::query_as::<_, Post>(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await),
        }
        .context("Failed to get post")?;
        Ok(post)
    }
}

enum PostKey<'a> {
    Id(i64),
    Slug(&'a str),
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &PostRecord, author_id: i64) -> Result<i64> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO posts (title, slug, excerpt, content, cover_image, published, highlight,
                               published_at, views, author_id, category_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
        "#;

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(&post.title)
                .bind(&post.slug)
                .bind(&post.excerpt)
                .bind(&post.content)
                .bind(&post.cover_image)
                .bind(post.published)
                .bind(post.highlight)
                .bind(post.published_at)
                .bind(author_id)
                .bind(post.category_id)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create post")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(&post.title)
                .bind(&post.slug)
                .bind(&post.excerpt)
                .bind(&post.content)
                .bind(&post.cover_image)
                .bind(post.published)
                .bind(post.highlight)
                .bind(post.published_at)
                .bind(author_id)
                .bind(post.category_id)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create post")?
                .last_insert_id() as i64,
        };

        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        self.fetch_one_where("p.id = ?", PostKey::Id(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        self.fetch_one_where("p.slug = ?", PostKey::Slug(slug)).await
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM posts WHERE slug = ? AND (? IS NULL OR id <> ?)";
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(sql)
            .bind(slug)
            .bind(exclude_id)
            .bind(exclude_id)
            .fetch_one(p)
            .await)
        .context("Failed to check post slug")?;
        Ok(count > 0)
    }

    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        let binds = FilterBinds::from(filter);
        let sql = format!("{} {} {} LIMIT ? OFFSET ?", POST_SELECT, POST_FILTER, POST_ORDER);

        let posts = on_backend!(self.pool, p => bind_filter!(sqlx::query_as::<_, Post>(&sql), binds)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(p)
            .await)
        .context("Failed to list posts")?;

        let total = self.count(filter).await?;
        Ok((posts, total))
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64> {
        let binds = FilterBinds::from(filter);
        let sql = format!(
            "SELECT COUNT(*) FROM posts p LEFT JOIN categories c ON c.id = p.category_id {}",
            POST_FILTER
        );
        let total = on_backend!(self.pool, p => bind_filter!(sqlx::query_scalar::<_, i64>(&sql), binds)
            .fetch_one(p)
            .await)
        .context("Failed to count posts")?;
        Ok(total)
    }

    async fn update(&self, id: i64, post: &PostRecord) -> Result<bool> {
        let sql = r#"
            UPDATE posts
            SET title = ?, slug = ?, excerpt = ?, content = ?, cover_image = ?, published = ?,
                highlight = ?, published_at = ?, category_id = ?, updated_at = ?
            WHERE id = ?
        "#;
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.excerpt)
            .bind(&post.content)
            .bind(&post.cover_image)
            .bind(post.published)
            .bind(post.highlight)
            .bind(post.published_at)
            .bind(post.category_id)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update post")?;
        Ok(affected > 0)
    }

    async fn set_published(
        &self,
        id: i64,
        published: bool,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let sql = "UPDATE posts SET published = ?, published_at = ?, updated_at = ? WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(published)
            .bind(published_at)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update post publication")?;
        Ok(affected > 0)
    }

    async fn set_highlight(&self, id: i64, highlight: bool) -> Result<bool> {
        let sql = "UPDATE posts SET highlight = ?, updated_at = ? WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(highlight)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update post highlight")?;
        Ok(affected > 0)
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        on_backend!(self.pool, p => sqlx::query("UPDATE posts SET views = views + 1 WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|_| ()))
        .context("Failed to increment post views")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete post")?;
        Ok(affected > 0)
    }
}
