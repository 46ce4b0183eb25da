//! Post service
//!
//! Business rules for news posts:
//! - slugs are generated from the title when omitted; a generated slug that
//!   collides gets a `-2`, `-3`, ... suffix, an explicit one is rejected
//! - `published_at` is stamped on first publication and kept afterwards
//! - readers only ever see published posts; every detail view counts
//! - writes invalidate the cached category counts and breaking-news links

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{CategoryRepository, PostRepository};
use crate::models::{
    CreatePostInput, ListParams, PagedResult, Post, PostFilter, PostRecord, UpdatePostInput,
};
use crate::services::slug::{generate_slug, unique_slug};
use crate::services::{breaking_news, category};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const DEFAULT_HIGHLIGHT_LIMIT: u32 = 5;
pub const DEFAULT_RELATED_LIMIT: u32 = 4;
const MAX_SIDEBAR_LIMIT: u32 = 20;

/// Slug base used when a title has nothing sluggable
const FALLBACK_SLUG: &str = "post";

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found")]
    NotFound,

    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    #[error("Slug must contain at least one letter or digit")]
    InvalidSlug,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            posts,
            categories,
            cache,
        }
    }

    // ------------------------------------------------------------------
    // Public reading
    // ------------------------------------------------------------------

    /// Published posts matching `filter`, newest first
    pub async fn list_public(
        &self,
        mut filter: PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        filter.published = Some(true);
        self.list(&filter, params).await
    }

    /// Published posts flagged for featured placement
    pub async fn highlights(&self, limit: Option<u32>) -> Result<Vec<Post>, PostServiceError> {
        let filter = PostFilter {
            highlight: Some(true),
            ..PostFilter::public()
        };
        let params = sidebar_params(limit, DEFAULT_HIGHLIGHT_LIMIT);
        let (posts, _) = self.posts.list(&filter, &params).await.context("Failed to list highlights")?;
        Ok(posts)
    }

    /// Published post by slug. Each call counts as a view.
    pub async fn read_published(&self, slug: &str) -> Result<Post, PostServiceError> {
        let mut post = self.published_by_slug(slug).await?;
        self.posts
            .increment_views(post.id)
            .await
            .context("Failed to count view")?;
        post.views += 1;
        Ok(post)
    }

    /// Other published posts from the same category as `slug`
    pub async fn related(&self, slug: &str, limit: Option<u32>) -> Result<Vec<Post>, PostServiceError> {
        let post = self.published_by_slug(slug).await?;
        let Some(category_id) = post.category_id else {
            return Ok(Vec::new());
        };

        let filter = PostFilter {
            category_id: Some(category_id),
            exclude_id: Some(post.id),
            ..PostFilter::public()
        };
        let params = sidebar_params(limit, DEFAULT_RELATED_LIMIT);
        let (posts, _) = self.posts.list(&filter, &params).await.context("Failed to list related posts")?;
        Ok(posts)
    }

    async fn published_by_slug(&self, slug: &str) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .filter(|post| post.published)
            .ok_or(PostServiceError::NotFound)
    }

    // ------------------------------------------------------------------
    // Dashboard
    // ------------------------------------------------------------------

    pub async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        let (posts, total) = self.posts.list(filter, params).await.context("Failed to list posts")?;
        Ok(PagedResult::new(posts, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    pub async fn create(&self, author_id: i64, input: CreatePostInput) -> Result<Post, PostServiceError> {
        self.ensure_category(input.category_id).await?;

        let title = input.title.trim().to_string();
        let slug = match input.slug.as_deref() {
            Some(explicit) => self.claim_explicit_slug(explicit, None).await?,
            None => self.generate_unique_slug(&title).await?,
        };

        let record = PostRecord {
            title,
            slug,
            excerpt: clean_optional(input.excerpt),
            content: input.content,
            cover_image: clean_optional(input.cover_image),
            published: input.published,
            highlight: input.highlight,
            published_at: PostRecord::publication_time(None, input.published, Utc::now()),
            category_id: input.category_id,
        };

        let id = self.posts.create(&record, author_id).await.context("Failed to create post")?;
        self.invalidate_dependents().await;
        tracing::info!(id, slug = %record.slug, published = record.published, "Post created");
        self.get(id).await
    }

    /// Replace a post's editable fields
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let existing = self.get(id).await?;
        self.ensure_category(input.category_id).await?;

        let slug = match input.slug.as_deref() {
            Some(explicit) => self.claim_explicit_slug(explicit, Some(id)).await?,
            None => existing.slug.clone(),
        };
        let published = input.published.unwrap_or(existing.published);

        let record = PostRecord {
            title: input.title.trim().to_string(),
            slug,
            excerpt: clean_optional(input.excerpt),
            content: input.content,
            cover_image: clean_optional(input.cover_image),
            published,
            highlight: input.highlight.unwrap_or(existing.highlight),
            published_at: PostRecord::publication_time(existing.published_at, published, Utc::now()),
            category_id: input.category_id,
        };

        if !self.posts.update(id, &record).await.context("Failed to update post")? {
            return Err(PostServiceError::NotFound);
        }
        self.invalidate_dependents().await;
        self.get(id).await
    }

    pub async fn set_published(&self, id: i64, published: bool) -> Result<Post, PostServiceError> {
        let existing = self.get(id).await?;
        let published_at = PostRecord::publication_time(existing.published_at, published, Utc::now());

        self.posts
            .set_published(id, published, published_at)
            .await
            .context("Failed to update publication")?;
        self.invalidate_dependents().await;
        tracing::info!(id, published, "Post publication changed");
        self.get(id).await
    }

    pub async fn set_highlight(&self, id: i64, highlight: bool) -> Result<Post, PostServiceError> {
        if !self
            .posts
            .set_highlight(id, highlight)
            .await
            .context("Failed to update highlight")?
        {
            return Err(PostServiceError::NotFound);
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        if !self.posts.delete(id).await.context("Failed to delete post")? {
            return Err(PostServiceError::NotFound);
        }
        self.invalidate_dependents().await;
        tracing::info!(id, "Post deleted");
        Ok(())
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<(), PostServiceError> {
        let Some(id) = category_id else {
            return Ok(());
        };
        match self.categories.get_by_id(id).await.context("Failed to check category")? {
            Some(_) => Ok(()),
            None => Err(PostServiceError::CategoryNotFound(id)),
        }
    }

    /// Normalize a caller-supplied slug and make sure no other post has it
    async fn claim_explicit_slug(&self, explicit: &str, exclude_id: Option<i64>) -> Result<String, PostServiceError> {
        let slug = generate_slug(explicit);
        if slug.is_empty() {
            return Err(PostServiceError::InvalidSlug);
        }
        if self
            .posts
            .slug_exists(&slug, exclude_id)
            .await
            .context("Failed to check slug")?
        {
            return Err(PostServiceError::DuplicateSlug(slug));
        }
        Ok(slug)
    }

    async fn generate_unique_slug(&self, title: &str) -> Result<String, PostServiceError> {
        let mut base = generate_slug(title);
        if base.is_empty() {
            base = FALLBACK_SLUG.to_string();
        }
        let posts = Arc::clone(&self.posts);
        let slug = unique_slug(&base, move |candidate| {
            let posts = Arc::clone(&posts);
            async move { posts.slug_exists(&candidate, None).await }
        })
        .await?;
        Ok(slug)
    }

    /// Post writes change category counts and breaking-news links
    async fn invalidate_dependents(&self) {
        for prefix in [category::CACHE_PREFIX, breaking_news::CACHE_PREFIX] {
            if let Err(e) = self.cache.delete_prefix(prefix).await {
                tracing::warn!("Failed to invalidate {} cache: {}", prefix, e);
            }
        }
    }
}

fn sidebar_params(limit: Option<u32>, default: u32) -> ListParams {
    ListParams::new(1, limit.unwrap_or(default).clamp(1, MAX_SIDEBAR_LIMIT))
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
