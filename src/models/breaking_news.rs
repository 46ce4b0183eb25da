//! Breaking-news ticker items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validators::http_url;

/// A ticker item, optionally pointing at a post or an external page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BreakingNews {
    pub id: i64,
    pub title: String,
    pub post_id: Option<i64>,
    pub url: Option<String>,
    pub active: bool,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_slug: Option<String>,
    #[serde(skip)]
    pub post_published: Option<bool>,
    /// Resolved target for readers, filled by [`BreakingNews::with_link`]
    #[sqlx(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BreakingNews {
    /// Where a reader clicking the item should land.
    ///
    /// A linked post wins when it is published; otherwise the external URL is
    /// used. Items without either have no link.
    pub fn resolve_link(&self) -> Option<String> {
        match (&self.post_slug, self.post_published) {
            (Some(slug), Some(true)) => Some(format!("/posts/{}", slug)),
            _ => self.url.clone(),
        }
    }

    pub fn with_link(mut self) -> Self {
        self.link = self.resolve_link();
        self
    }
}

/// Column values written on insert and update
#[derive(Debug, Clone)]
pub struct BreakingNewsRecord {
    pub title: String,
    pub post_id: Option<i64>,
    pub url: Option<String>,
    pub active: bool,
    pub priority: i32,
}

/// Body of `POST /api/admin/breaking-news` and `PUT /api/admin/breaking-news/{id}`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BreakingNewsInput {
    #[validate(length(min = 3, max = 200, message = "must be between 3 and 200 characters"))]
    pub title: String,
    pub post_id: Option<i64>,
    #[validate(custom(function = "http_url"))]
    pub url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    #[validate(range(min = -1000, max = 1000, message = "must be between -1000 and 1000"))]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(post_slug: Option<&str>, post_published: Option<bool>, url: Option<&str>) -> BreakingNews {
        let now = Utc::now();
        BreakingNews {
            id: 1,
            title: "Markets fall".to_string(),
            post_id: post_slug.map(|_| 9),
            url: url.map(str::to_string),
            active: true,
            priority: 0,
            post_slug: post_slug.map(str::to_string),
            post_published,
            link: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_link_to_published_post() {
        let news = item(Some("markets-fall"), Some(true), None).with_link();
        assert_eq!(news.link.as_deref(), Some("/posts/markets-fall"));
    }

    #[test]
    fn test_link_skips_unpublished_post() {
        assert_eq!(item(Some("draft"), Some(false), None).resolve_link(), None);
    }

    #[test]
    fn test_link_to_external_url() {
        let news = item(None, None, Some("https://example.com/live"));
        assert_eq!(news.resolve_link().as_deref(), Some("https://example.com/live"));
    }

    #[test]
    fn test_no_link() {
        assert_eq!(item(None, None, None).resolve_link(), None);
    }

    #[test]
    fn test_input_defaults_and_url_rule() {
        let parsed: BreakingNewsInput =
            serde_json::from_str(r#"{"title":"Polls close","url":"ftp://example.com"}"#).unwrap();
        assert!(parsed.active);
        assert_eq!(parsed.priority, 0);
        assert!(parsed.validate().unwrap_err().field_errors().contains_key("url"));
    }
}
