//! Services layer - Business logic
//!
//! Services sit between the API handlers and the repositories. They own the
//! newsroom rules (slugs, publication, ticker links, roles, bans) and keep
//! the cache consistent with every write.

pub mod auth;
pub mod breaking_news;
pub mod category;
pub mod dashboard;
pub mod message;
pub mod password;
pub mod permissions;
pub mod post;
pub mod rate_limiter;
pub mod slug;
pub mod storage;
pub mod user;

pub use auth::{AuthError, AuthService, SessionMeta};
pub use breaking_news::{BreakingNewsService, BreakingNewsServiceError};
pub use category::{CategoryService, CategoryServiceError};
pub use dashboard::{DashboardService, DashboardStats};
pub use message::{MessageService, MessageServiceError};
pub use password::{hash_password, verify_password};
pub use permissions::{role_allows, Action, Resource};
pub use post::{PostService, PostServiceError};
pub use rate_limiter::{RateLimiters, SlidingWindowLimiter};
pub use slug::generate_slug;
pub use storage::{create_image_store, ImageStore, StoredImage, UploadError, UploadService};
pub use user::{UserService, UserServiceError};
