//! Post model
//!
//! A post is a news article. Only published posts are visible on the public
//! API; drafts are reachable from the dashboard only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validators::{image_ref, not_blank};

/// Post row joined with its author and category names
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub published: bool,
    pub highlight: bool,
    /// Set on first publication, kept across unpublish/republish
    pub published_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub author_id: i64,
    pub author_name: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values written on insert and update
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub published: bool,
    pub highlight: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub category_id: Option<i64>,
}

impl PostRecord {
    /// Publication timestamp after moving to `published`.
    ///
    /// The first publication stamps `now`; later transitions keep the original.
    pub fn publication_time(
        current: Option<DateTime<Utc>>,
        published: bool,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match (current, published) {
            (Some(at), _) => Some(at),
            (None, true) => Some(now),
            (None, false) => None,
        }
    }
}

/// Query filters for post lists
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub published: Option<bool>,
    pub highlight: Option<bool>,
    pub category_id: Option<i64>,
    pub category_slug: Option<String>,
    pub author_id: Option<i64>,
    /// Substring matched against title and excerpt
    pub search: Option<String>,
    pub exclude_id: Option<i64>,
}

impl PostFilter {
    /// Filter matching what anonymous readers may see
    pub fn public() -> Self {
        Self {
            published: Some(true),
            ..Self::default()
        }
    }
}

/// Body of `POST /api/admin/posts`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 3, max = 200, message = "must be between 3 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub slug: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub excerpt: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub content: String,
    #[validate(custom(function = "image_ref"))]
    pub cover_image: Option<String>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub highlight: bool,
}

/// Body of `PUT /api/admin/posts/{id}`.
///
/// Replaces the editable fields. An omitted slug keeps the current one and
/// omitted flags keep their state.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePostInput {
    #[validate(length(min = 3, max = 200, message = "must be between 3 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub slug: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub excerpt: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub content: String,
    #[validate(custom(function = "image_ref"))]
    pub cover_image: Option<String>,
    pub category_id: Option<i64>,
    pub published: Option<bool>,
    pub highlight: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(title: &str, content: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            slug: None,
            excerpt: None,
            content: content.to_string(),
            cover_image: None,
            category_id: None,
            published: false,
            highlight: false,
        }
    }

    #[test]
    fn test_publication_time_is_stamped_once() {
        let first = Utc::now() - Duration::days(3);
        let now = Utc::now();

        assert_eq!(PostRecord::publication_time(None, false, now), None);
        assert_eq!(PostRecord::publication_time(None, true, now), Some(now));
        assert_eq!(PostRecord::publication_time(Some(first), true, now), Some(first));
        assert_eq!(PostRecord::publication_time(Some(first), false, now), Some(first));
    }

    #[test]
    fn test_create_input_validation() {
        assert!(input("Election night", "Full coverage").validate().is_ok());

        let errors = input("Hi", "   ").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("content"));
    }

    #[test]
    fn test_cover_image_must_be_url_or_path() {
        let mut post = input("Storm warning", "Details");
        post.cover_image = Some("/uploads/storm.jpg".to_string());
        assert!(post.validate().is_ok());

        post.cover_image = Some("storm.jpg".to_string());
        assert!(post.validate().unwrap_err().field_errors().contains_key("cover_image"));
    }

    #[test]
    fn test_flags_default_to_false() {
        let parsed: CreatePostInput =
            serde_json::from_str(r#"{"title":"Budget vote","content":"Text"}"#).unwrap();
        assert!(!parsed.published);
        assert!(!parsed.highlight);
    }
}
