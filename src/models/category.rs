//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A news section such as "World" or "Sports"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category plus the number of published posts filed under it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub category: Category,
    pub post_count: i64,
}

/// Body of `POST /api/admin/categories`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 2, max = 80, message = "must be between 2 and 80 characters"))]
    pub name: String,
    /// Generated from the name when omitted
    #[validate(length(max = 120, message = "must be at most 120 characters"))]
    pub slug: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub description: Option<String>,
}

/// Body of `PUT /api/admin/categories/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 2, max = 80, message = "must be between 2 and 80 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 120, message = "must be between 1 and 120 characters"))]
    pub slug: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_name_length() {
        let short = CreateCategoryInput {
            name: "A".to_string(),
            slug: None,
            description: None,
        };
        let errors = short.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));

        let ok = CreateCategoryInput {
            name: "Économie".to_string(),
            slug: None,
            description: None,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_with_count_serializes_flat() {
        let now = Utc::now();
        let value = serde_json::to_value(CategoryWithCount {
            category: Category {
                id: 3,
                name: "World".to_string(),
                slug: "world".to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            },
            post_count: 12,
        })
        .unwrap();
        assert_eq!(value["slug"], "world");
        assert_eq!(value["post_count"], 12);
    }
}
