//! Post API endpoints
//!
//! Public reading:
//! - GET /api/posts - Published posts with filters and pagination
//! - GET /api/posts/highlights - Featured posts
//! - GET /api/posts/{slug} - Post detail, counts a view
//! - GET /api/posts/{slug}/related - Same-category posts
//!
//! Dashboard, under /api/admin/posts:
//! - GET / POST, GET / PUT / DELETE /{id}
//! - PATCH /{id}/publish, PATCH /{id}/highlight

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::common::{search_term, ApiPath, ApiQuery, LimitQuery, ValidatedJson};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreatePostInput, ListParams, PagedResult, Post, PostFilter, UpdatePostInput};
use crate::services::{Action, PostServiceError, Resource};

impl From<PostServiceError> for ApiError {
    fn from(error: PostServiceError) -> Self {
        match error {
            PostServiceError::NotFound => ApiError::not_found("Post not found"),
            PostServiceError::DuplicateSlug(slug) => {
                ApiError::already_exists(format!("A post with slug '{}' already exists", slug))
            }
            PostServiceError::CategoryNotFound(id) => {
                ApiError::bad_request(format!("Category {} does not exist", id))
            }
            PostServiceError::InvalidSlug => {
                ApiError::field("slug", "must contain at least one letter or digit")
            }
            PostServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

/// Query for `GET /api/posts`
#[derive(Debug, Default, Deserialize)]
pub struct PublicPostsQuery {
    /// Category slug
    pub category: Option<String>,
    pub highlight: Option<bool>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Query for `GET /api/admin/posts`
#[derive(Debug, Default, Deserialize)]
pub struct AdminPostsQuery {
    pub published: Option<bool>,
    pub highlight: Option<bool>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PublishBody {
    pub published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HighlightBody {
    pub highlight: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/highlights", get(highlights))
        .route("/{slug}", get(get_post))
        .route("/{slug}/related", get(related_posts))
}

/// Staff routes, nested under `/api/admin/posts`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_posts).post(create_post))
        .route(
            "/{id}",
            get(admin_get_post).put(update_post).delete(delete_post),
        )
        .route("/{id}/publish", patch(set_published))
        .route("/{id}/highlight", patch(set_highlight))
}

/// GET /api/posts
async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PublicPostsQuery>,
) -> Result<Json<PagedResult<Post>>, ApiError> {
    let filter = PostFilter {
        category_slug: search_term(query.category),
        highlight: query.highlight,
        search: search_term(query.q),
        ..PostFilter::public()
    };
    let params = ListParams::from_query(query.page, query.per_page);
    Ok(Json(state.posts.list_public(filter, &params).await?))
}

/// GET /api/posts/highlights
async fn highlights(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.posts.highlights(query.limit).await?))
}

/// GET /api/posts/{slug}
async fn get_post(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.posts.read_published(&slug).await?))
}

/// GET /api/posts/{slug}/related
async fn related_posts(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.posts.related(&slug, query.limit).await?))
}

/// GET /api/admin/posts
async fn admin_list_posts(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiQuery(query): ApiQuery<AdminPostsQuery>,
) -> Result<Json<PagedResult<Post>>, ApiError> {
    current.require(Resource::Post, Action::Read)?;
    let filter = PostFilter {
        published: query.published,
        highlight: query.highlight,
        category_id: query.category_id,
        author_id: query.author_id,
        search: search_term(query.q),
        ..PostFilter::default()
    };
    let params = ListParams::from_query(query.page, query.per_page);
    Ok(Json(state.posts.list(&filter, &params).await?))
}

/// POST /api/admin/posts
async fn create_post(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ValidatedJson(input): ValidatedJson<CreatePostInput>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    current.require(Resource::Post, Action::Create)?;
    if input.published {
        current.require(Resource::Post, Action::Publish)?;
    }
    let post = state.posts.create(current.user.id, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/admin/posts/{id}
async fn admin_get_post(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Post>, ApiError> {
    current.require(Resource::Post, Action::Read)?;
    Ok(Json(state.posts.get(id).await?))
}

/// PUT /api/admin/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(input): ValidatedJson<UpdatePostInput>,
) -> Result<Json<Post>, ApiError> {
    current.require(Resource::Post, Action::Update)?;
    if input.published.is_some() {
        current.require(Resource::Post, Action::Publish)?;
    }
    Ok(Json(state.posts.update(id, input).await?))
}

/// DELETE /api/admin/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    current.require(Resource::Post, Action::Delete)?;
    state.posts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/admin/posts/{id}/publish
async fn set_published(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(body): ValidatedJson<PublishBody>,
) -> Result<Json<Post>, ApiError> {
    current.require(Resource::Post, Action::Publish)?;
    Ok(Json(state.posts.set_published(id, body.published).await?))
}

/// PATCH /api/admin/posts/{id}/highlight
async fn set_highlight(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(body): ValidatedJson<HighlightBody>,
) -> Result<Json<Post>, ApiError> {
    current.require(Resource::Post, Action::Update)?;
    Ok(Json(state.posts.set_highlight(id, body.highlight).await?))
}
