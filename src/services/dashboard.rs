//! Dashboard overview counts

use crate::db::repositories::{
    BreakingNewsRepository, CategoryRepository, MessageRepository, PostRepository, UserRepository,
};
use crate::models::{ListParams, Post, PostFilter};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

const RECENT_POSTS: u32 = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PostCounts {
    pub total: i64,
    pub published: i64,
    pub drafts: i64,
    pub highlighted: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub posts: PostCounts,
    pub categories: i64,
    pub breaking_news_active: i64,
    pub messages_unread: i64,
    pub users: i64,
    pub recent_posts: Vec<Post>,
}

pub struct DashboardService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    breaking_news: Arc<dyn BreakingNewsRepository>,
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
}

impl DashboardService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        breaking_news: Arc<dyn BreakingNewsRepository>,
        messages: Arc<dyn MessageRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            posts,
            categories,
            breaking_news,
            messages,
            users,
        }
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        let total = self.posts.count(&PostFilter::default()).await?;
        let published = self.posts.count(&PostFilter::public()).await?;
        let highlighted = self
            .posts
            .count(&PostFilter {
                highlight: Some(true),
                ..PostFilter::default()
            })
            .await?;
        let (recent_posts, _) = self
            .posts
            .list(&PostFilter::default(), &ListParams::new(1, RECENT_POSTS))
            .await
            .context("Failed to load recent posts")?;

        Ok(DashboardStats {
            posts: PostCounts {
                total,
                published,
                drafts: total - published,
                highlighted,
            },
            categories: self.categories.count().await?,
            breaking_news_active: self.breaking_news.count_active().await?,
            messages_unread: self.messages.count_unread().await?,
            users: self.users.count().await?,
            recent_posts,
        })
    }
}
