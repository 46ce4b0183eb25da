//! Breaking-news ticker service
//!
//! An item points at a post or at an external URL, never both. The active
//! ticker is cached; every write here (and every post write) drops it.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{BreakingNewsRepository, PostRepository};
use crate::models::{BreakingNews, BreakingNewsInput, BreakingNewsRecord};
use anyhow::Context;
use std::sync::Arc;

/// Every breaking-news cache key starts with this prefix
pub const CACHE_PREFIX: &str = "breaking:";
const CACHE_KEY_ACTIVE: &str = "breaking:active";

#[derive(Debug, thiserror::Error)]
pub enum BreakingNewsServiceError {
    #[error("Breaking news item not found")]
    NotFound,

    #[error("Linked post not found: {0}")]
    PostNotFound(i64),

    /// Both `post_id` and `url` were supplied
    #[error("An item links to either a post or a URL, not both")]
    ConflictingLinks,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BreakingNewsService {
    repo: Arc<dyn BreakingNewsRepository>,
    posts: Arc<dyn PostRepository>,
    cache: Arc<Cache>,
}

impl BreakingNewsService {
    pub fn new(
        repo: Arc<dyn BreakingNewsRepository>,
        posts: Arc<dyn PostRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self { repo, posts, cache }
    }

    /// Active items for the public ticker, each with its resolved link
    pub async fn list_active(&self) -> Result<Vec<BreakingNews>, BreakingNewsServiceError> {
        if let Some(cached) = self.cache.lookup::<Vec<BreakingNews>>(CACHE_KEY_ACTIVE).await {
            return Ok(cached);
        }

        let items: Vec<BreakingNews> = self
            .repo
            .list(true)
            .await
            .context("Failed to list active breaking news")?
            .into_iter()
            .map(BreakingNews::with_link)
            .collect();

        self.cache.remember(CACHE_KEY_ACTIVE, &items).await;
        Ok(items)
    }

    pub async fn list_all(&self) -> Result<Vec<BreakingNews>, BreakingNewsServiceError> {
        let items = self.repo.list(false).await.context("Failed to list breaking news")?;
        Ok(items.into_iter().map(BreakingNews::with_link).collect())
    }

    pub async fn get(&self, id: i64) -> Result<BreakingNews, BreakingNewsServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get breaking news")?
            .ok_or(BreakingNewsServiceError::NotFound)
    }

    pub async fn create(&self, input: BreakingNewsInput) -> Result<BreakingNews, BreakingNewsServiceError> {
        let record = self.record_from(input).await?;
        let id = self.repo.create(&record).await.context("Failed to create breaking news")?;
        self.invalidate_cache().await;
        tracing::info!(id, active = record.active, "Breaking news created");
        self.get(id).await
    }

    pub async fn update(&self, id: i64, input: BreakingNewsInput) -> Result<BreakingNews, BreakingNewsServiceError> {
        self.get(id).await?;
        let record = self.record_from(input).await?;
        if !self.repo.update(id, &record).await.context("Failed to update breaking news")? {
            return Err(BreakingNewsServiceError::NotFound);
        }
        self.invalidate_cache().await;
        self.get(id).await
    }

    /// Flip the `active` flag
    pub async fn toggle(&self, id: i64) -> Result<BreakingNews, BreakingNewsServiceError> {
        let item = self.get(id).await?;
        self.repo
            .set_active(id, !item.active)
            .await
            .context("Failed to toggle breaking news")?;
        self.invalidate_cache().await;
        tracing::info!(id, active = !item.active, "Breaking news toggled");
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), BreakingNewsServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete breaking news")? {
            return Err(BreakingNewsServiceError::NotFound);
        }
        self.invalidate_cache().await;
        Ok(())
    }

    async fn record_from(&self, input: BreakingNewsInput) -> Result<BreakingNewsRecord, BreakingNewsServiceError> {
        let url = input
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        if input.post_id.is_some() && url.is_some() {
            return Err(BreakingNewsServiceError::ConflictingLinks);
        }
        if let Some(post_id) = input.post_id {
            if self.posts.get_by_id(post_id).await.context("Failed to check post")?.is_none() {
                return Err(BreakingNewsServiceError::PostNotFound(post_id));
            }
        }

        Ok(BreakingNewsRecord {
            title: input.title.trim().to_string(),
            post_id: input.post_id,
            url,
            active: input.active,
            priority: input.priority,
        })
    }

    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete_prefix(CACHE_PREFIX).await {
            tracing::warn!("Failed to invalidate breaking news cache: {}", e);
        }
    }
}
