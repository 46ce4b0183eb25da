//! User administration endpoints, admin only
//!
//! - GET /api/admin/users?q=&role=&page=&per_page=
//! - POST /api/admin/users
//! - GET / DELETE /api/admin/users/{id}
//! - PUT /api/admin/users/{id}/role
//! - POST /api/admin/users/{id}/ban, POST /api/admin/users/{id}/unban

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{search_term, ApiPath, ApiQuery, ValidatedJson};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ListParams, PagedResult, User, UserFilter, UserRole};
use crate::services::user::{BanInput, CreateUserInput, UpdateRoleInput};
use crate::services::{Action, Resource, UserServiceError};

impl From<UserServiceError> for ApiError {
    fn from(error: UserServiceError) -> Self {
        match error {
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::SelfModification(action) => {
                ApiError::bad_request(format!("You cannot {} your own account", action))
            }
            UserServiceError::EmailTaken(_) => ApiError::already_exists("Email is already registered"),
            UserServiceError::Auth(e) => e.into(),
            UserServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub q: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Nested under `/api/admin/users` behind `require_admin`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).delete(delete_user))
        .route("/{id}/role", put(set_role))
        .route("/{id}/ban", post(ban_user))
        .route("/{id}/unban", post(unban_user))
}

async fn list_users(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiQuery(query): ApiQuery<UsersQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    current.require(Resource::User, Action::Read)?;
    let filter = UserFilter {
        search: search_term(query.q),
        role: query.role,
    };
    let params = ListParams::from_query(query.page, query.per_page);
    Ok(Json(state.users.list(&filter, &params).await?))
}

async fn get_user(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<User>, ApiError> {
    current.require(Resource::User, Action::Read)?;
    Ok(Json(state.users.get(id).await?))
}

async fn create_user(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ValidatedJson(input): ValidatedJson<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    current.require(Resource::User, Action::Create)?;
    let user = state.users.create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/admin/users/{id}/role
async fn set_role(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(input): ValidatedJson<UpdateRoleInput>,
) -> Result<Json<User>, ApiError> {
    current.require(Resource::User, Action::Update)?;
    Ok(Json(state.users.set_role(&current.user, id, input.role).await?))
}

/// POST /api/admin/users/{id}/ban
async fn ban_user(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(input): ValidatedJson<BanInput>,
) -> Result<Json<User>, ApiError> {
    current.require(Resource::User, Action::Ban)?;
    Ok(Json(state.users.ban(&current.user, id, input).await?))
}

/// POST /api/admin/users/{id}/unban
async fn unban_user(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<User>, ApiError> {
    current.require(Resource::User, Action::Ban)?;
    Ok(Json(state.users.unban(&current.user, id).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    current.require(Resource::User, Action::Delete)?;
    state.users.delete(&current.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
