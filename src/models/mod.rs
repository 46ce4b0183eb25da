//! Data models
//!
//! Database rows (derived `sqlx::FromRow`, shared by both backends), the
//! request bodies accepted by the API with their validation rules, and
//! pagination types.

mod breaking_news;
mod category;
mod message;
mod pagination;
mod post;
mod session;
mod user;
pub mod validators;

pub use breaking_news::{BreakingNews, BreakingNewsInput, BreakingNewsRecord};
pub use category::{Category, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput};
pub use message::{CreateMessageInput, Message};
pub use pagination::{ListParams, PagedResult, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use post::{CreatePostInput, Post, PostFilter, PostRecord, UpdatePostInput};
pub use session::{Account, Session, CREDENTIAL_PROVIDER};
pub use user::{NewUser, User, UserFilter, UserRole};
