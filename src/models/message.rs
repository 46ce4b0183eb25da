//! Contact-form messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validators::{not_blank, phone_number};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub content: String,
    #[serde(rename = "read")]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of the public `POST /api/messages`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMessageInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(
        length(min = 5, max = 40, message = "must be between 5 and 40 characters"),
        custom(function = "phone_number")
    )]
    pub phone: Option<String>,
    #[validate(length(min = 2, max = 150, message = "must be between 2 and 150 characters"))]
    pub subject: String,
    #[validate(
        length(min = 10, max = 5000, message = "must be between 10 and 5000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}
