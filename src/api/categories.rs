//! Category API endpoints
//!
//! - GET /api/categories - All categories with published post counts
//! - GET /api/categories/{slug} - Single category
//! - GET /api/categories/{slug}/posts - Published posts in the category
//! - POST /api/admin/categories, GET / PUT / DELETE /api/admin/categories/{id}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::{ApiPath, ApiQuery, PageQuery, ValidatedJson};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Category, CategoryWithCount, CreateCategoryInput, PagedResult, Post, PostFilter, UpdateCategoryInput,
};
use crate::services::{Action, CategoryServiceError, Resource};

impl From<CategoryServiceError> for ApiError {
    fn from(error: CategoryServiceError) -> Self {
        match error {
            CategoryServiceError::DuplicateName(name) => {
                ApiError::already_exists(format!("A category named '{}' already exists", name))
            }
            CategoryServiceError::DuplicateSlug(slug) => {
                ApiError::already_exists(format!("A category with slug '{}' already exists", slug))
            }
            CategoryServiceError::NotFound => ApiError::not_found("Category not found"),
            CategoryServiceError::InvalidSlug => {
                ApiError::field("slug", "must contain at least one letter or digit")
            }
            CategoryServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{slug}", get(get_category))
        .route("/{slug}/posts", get(category_posts))
}

/// Staff routes, nested under `/api/admin/categories`
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", post(create_category)).route(
        "/{id}",
        get(admin_get_category)
            .put(update_category)
            .delete(delete_category),
    )
}

/// GET /api/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryWithCount>>, ApiError> {
    Ok(Json(state.categories.list().await?))
}

/// GET /api/categories/{slug}
async fn get_category(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.categories.get_by_slug(&slug).await?))
}

/// GET /api/categories/{slug}/posts
async fn category_posts(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PagedResult<Post>>, ApiError> {
    let category = state.categories.get_by_slug(&slug).await?;
    let filter = PostFilter {
        category_id: Some(category.id),
        ..PostFilter::public()
    };
    Ok(Json(state.posts.list_public(filter, &query.params()).await?))
}

/// POST /api/admin/categories
async fn create_category(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ValidatedJson(input): ValidatedJson<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    current.require(Resource::Category, Action::Create)?;
    let category = state.categories.create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/admin/categories/{id}
async fn admin_get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.categories.get_by_id(id).await?))
}

/// PUT /api/admin/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(input): ValidatedJson<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    current.require(Resource::Category, Action::Update)?;
    Ok(Json(state.categories.update(id, input).await?))
}

/// DELETE /api/admin/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    current.require(Resource::Category, Action::Delete)?;
    state.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
