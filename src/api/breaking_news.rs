//! Breaking news ticker endpoints
//!
//! - GET /api/breaking-news - Active items with their resolved links
//! - /api/admin/breaking-news: GET, POST, GET / PUT / DELETE /{id}, PATCH /{id}/toggle

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};

use crate::api::common::{ApiPath, ValidatedJson};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{BreakingNews, BreakingNewsInput};
use crate::services::{Action, BreakingNewsServiceError, Resource};

impl From<BreakingNewsServiceError> for ApiError {
    fn from(error: BreakingNewsServiceError) -> Self {
        match error {
            BreakingNewsServiceError::NotFound => ApiError::not_found("Breaking news item not found"),
            BreakingNewsServiceError::PostNotFound(id) => {
                ApiError::bad_request(format!("Post {} does not exist", id))
            }
            BreakingNewsServiceError::ConflictingLinks => {
                ApiError::field("url", "cannot be set together with post_id")
            }
            BreakingNewsServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_active))
}

/// Staff routes, nested under `/api/admin/breaking-news`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_item))
        .route("/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/{id}/toggle", patch(toggle_item))
}

/// GET /api/breaking-news
async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<BreakingNews>>, ApiError> {
    Ok(Json(state.breaking_news.list_active().await?))
}

async fn list_all(
    State(state): State<AppState>,
    current: AuthenticatedUser,
) -> Result<Json<Vec<BreakingNews>>, ApiError> {
    current.require(Resource::BreakingNews, Action::Read)?;
    Ok(Json(state.breaking_news.list_all().await?))
}

async fn get_item(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<BreakingNews>, ApiError> {
    current.require(Resource::BreakingNews, Action::Read)?;
    Ok(Json(state.breaking_news.get(id).await?))
}

async fn create_item(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ValidatedJson(input): ValidatedJson<BreakingNewsInput>,
) -> Result<(StatusCode, Json<BreakingNews>), ApiError> {
    current.require(Resource::BreakingNews, Action::Create)?;
    let item = state.breaking_news.create(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(input): ValidatedJson<BreakingNewsInput>,
) -> Result<Json<BreakingNews>, ApiError> {
    current.require(Resource::BreakingNews, Action::Update)?;
    Ok(Json(state.breaking_news.update(id, input).await?))
}

/// PATCH /api/admin/breaking-news/{id}/toggle
async fn toggle_item(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<BreakingNews>, ApiError> {
    current.require(Resource::BreakingNews, Action::Update)?;
    Ok(Json(state.breaking_news.toggle(id).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    current.require(Resource::BreakingNews, Action::Delete)?;
    state.breaking_news.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
