//! Category repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Category, CategoryWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name, with published post counts
    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>>;

    async fn update(
        &self,
        id: i64,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<bool>;

    /// Delete a category; its posts keep existing with no category
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_where(&self, column: &str, value: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE {} = ?", CATEGORY_COLUMNS, column);
        let category = on_backend!(self.pool, p => sqlx::query_as::<_, Category>(&sql)
            .bind(value)
            .fetch_optional(p)
            .await)
        .with_context(|| format!("Failed to get category by {}", column))?;
        Ok(category)
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Category> {
        let now = Utc::now();
        let sql = "INSERT INTO categories (name, slug, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)";

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(name)
                .bind(slug)
                .bind(description)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create category")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(name)
                .bind(slug)
                .bind(description)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create category")?
                .last_insert_id() as i64,
        };

        Ok(Category {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            description: description.map(str::to_string),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        let category = on_backend!(self.pool, p => sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get category by ID")?;
        Ok(category)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.get_where("slug", slug).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        self.get_where("name", name).await
    }

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>> {
        let sql = r#"
            SELECT c.id, c.name, c.slug, c.description, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM posts p WHERE p.category_id = c.id AND p.published = ?) AS post_count
            FROM categories c
            ORDER BY c.name ASC
        "#;
        let categories = on_backend!(self.pool, p => sqlx::query_as::<_, CategoryWithCount>(sql)
            .bind(true)
            .fetch_all(p)
            .await)
        .context("Failed to list categories")?;
        Ok(categories)
    }

    async fn update(
        &self,
        id: i64,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<bool> {
        let sql = "UPDATE categories SET name = ?, slug = ?, description = ?, updated_at = ? WHERE id = ?";
        let affected = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(name)
            .bind(slug)
            .bind(description)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to update category")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete category")?;
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
            .fetch_one(p)
            .await)
        .context("Failed to count categories")?;
        Ok(count)
    }
}
