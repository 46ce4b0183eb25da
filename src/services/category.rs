//! Category service
//!
//! Create, read, update and delete categories. Names and slugs are unique;
//! a slug left out is generated from the name. The public list (with
//! published post counts) and slug lookups are cached until the next write.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput};
use crate::services::slug::generate_slug;
use anyhow::Context;
use std::sync::Arc;

/// Every category cache key starts with this prefix
pub const CACHE_PREFIX: &str = "categories:";
const CACHE_KEY_LIST: &str = "categories:list";
const CACHE_KEY_BY_SLUG: &str = "categories:slug:";

#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category name already exists: {0}")]
    DuplicateName(String),

    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found")]
    NotFound,

    /// The slug normalizes to nothing
    #[error("Slug must contain at least one letter or digit")]
    InvalidSlug,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// All categories by name, with published post counts
    pub async fn list(&self) -> Result<Vec<CategoryWithCount>, CategoryServiceError> {
        if let Some(cached) = self.cache.lookup::<Vec<CategoryWithCount>>(CACHE_KEY_LIST).await {
            return Ok(cached);
        }

        let categories = self.repo.list_with_counts().await.context("Failed to list categories")?;
        self.cache.remember(CACHE_KEY_LIST, &categories).await;
        Ok(categories)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_BY_SLUG, slug);
        if let Some(category) = self.cache.lookup::<Category>(&cache_key).await {
            return Ok(category);
        }

        let category = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
            .ok_or(CategoryServiceError::NotFound)?;

        self.cache.remember(&cache_key, &category).await;
        Ok(category)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or(CategoryServiceError::NotFound)
    }

    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = input.name.trim().to_string();
        let slug = normalize_slug(input.slug.as_deref(), &name)?;
        let description = clean_description(input.description.as_deref());

        if self.repo.get_by_name(&name).await.context("Failed to check name")?.is_some() {
            return Err(CategoryServiceError::DuplicateName(name));
        }
        if self.repo.get_by_slug(&slug).await.context("Failed to check slug")?.is_some() {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        let category = self
            .repo
            .create(&name, &slug, description)
            .await
            .context("Failed to create category")?;

        self.invalidate_cache().await;
        tracing::info!(id = category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    /// Apply the fields present in `input`; absent fields keep their value
    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> Result<Category, CategoryServiceError> {
        let existing = self.get_by_id(id).await?;

        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or_else(|| existing.name.clone());
        let slug = match input.slug.as_deref() {
            Some(slug) => normalize_slug(Some(slug), &name)?,
            None => existing.slug.clone(),
        };
        let description = match input.description.as_deref() {
            Some(text) => clean_description(Some(text)),
            None => existing.description.as_deref(),
        };

        if name != existing.name {
            if let Some(other) = self.repo.get_by_name(&name).await.context("Failed to check name")? {
                if other.id != id {
                    return Err(CategoryServiceError::DuplicateName(name));
                }
            }
        }
        if slug != existing.slug {
            if let Some(other) = self.repo.get_by_slug(&slug).await.context("Failed to check slug")? {
                if other.id != id {
                    return Err(CategoryServiceError::DuplicateSlug(slug));
                }
            }
        }

        if !self
            .repo
            .update(id, &name, &slug, description)
            .await
            .context("Failed to update category")?
        {
            return Err(CategoryServiceError::NotFound);
        }

        self.invalidate_cache().await;
        self.get_by_id(id).await
    }

    /// Delete a category; its posts stay, uncategorized
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete category")? {
            return Err(CategoryServiceError::NotFound);
        }
        self.invalidate_cache().await;
        tracing::info!(id, "Category deleted");
        Ok(())
    }

    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete_prefix(CACHE_PREFIX).await {
            tracing::warn!("Failed to invalidate category cache: {}", e);
        }
    }
}

/// Slug from the explicit value when given, otherwise from the name
fn normalize_slug(explicit: Option<&str>, name: &str) -> Result<String, CategoryServiceError> {
    let slug = generate_slug(explicit.unwrap_or(name));
    if slug.is_empty() {
        return Err(CategoryServiceError::InvalidSlug);
    }
    Ok(slug)
}

fn clean_description(description: Option<&str>) -> Option<&str> {
    description.map(str::trim).filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::db::repositories::SqlxCategoryRepository;

    async fn setup_test_service() -> CategoryService {
        let pool = migrated_pool().await;
        CategoryService::new(
            SqlxCategoryRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
        )
    }

    fn input(name: &str, slug: Option<&str>) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.to_string(),
            slug: slug.map(str::to_string),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_generates_slug() {
        let service = setup_test_service().await;
        let category = service.create(input("World Affairs", None)).await.unwrap();
        assert_eq!(category.slug, "world-affairs");

        let explicit = service.create(input("Sport", Some("Sports Desk"))).await.unwrap();
        assert_eq!(explicit.slug, "sports-desk");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let service = setup_test_service().await;
        service.create(input("World", None)).await.unwrap();

        assert!(matches!(
            service.create(input("World", Some("world-2"))).await,
            Err(CategoryServiceError::DuplicateName(_))
        ));
        assert!(matches!(
            service.create(input("Globe", Some("world"))).await,
            Err(CategoryServiceError::DuplicateSlug(_))
        ));
        assert!(matches!(
            service.create(input("!!", None)).await,
            Err(CategoryServiceError::InvalidSlug)
        ));
    }

    #[tokio::test]
    async fn test_list_is_invalidated_on_write() {
        let service = setup_test_service().await;
        service.create(input("World", None)).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.create(input("Business", None)).await.unwrap();
        let names: Vec<String> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.category.name)
            .collect();
        assert_eq!(names, vec!["Business", "World"]);
    }

    #[tokio::test]
    async fn test_update_partial_fields() {
        let service = setup_test_service().await;
        let created = service.create(input("World", None)).await.unwrap();
        service.create(input("Business", None)).await.unwrap();

        let renamed = service
            .update(
                created.id,
                UpdateCategoryInput {
                    name: Some("World News".to_string()),
                    description: Some("Global coverage".to_string()),
                    ..UpdateCategoryInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "World News");
        assert_eq!(renamed.slug, "world");
        assert_eq!(renamed.description.as_deref(), Some("Global coverage"));

        let clash = service
            .update(
                created.id,
                UpdateCategoryInput {
                    slug: Some("business".to_string()),
                    ..UpdateCategoryInput::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(CategoryServiceError::DuplicateSlug(_))));

        let missing = service.update(999, UpdateCategoryInput::default()).await;
        assert!(matches!(missing, Err(CategoryServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_get_by_slug_and_delete() {
        let service = setup_test_service().await;
        let created = service.create(input("Culture", None)).await.unwrap();

        assert_eq!(service.get_by_slug("culture").await.unwrap().id, created.id);

        service.delete(created.id).await.unwrap();
        assert!(matches!(
            service.get_by_slug("culture").await,
            Err(CategoryServiceError::NotFound)
        ));
        assert!(matches!(service.delete(created.id).await, Err(CategoryServiceError::NotFound)));
    }
}
