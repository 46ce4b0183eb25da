//! Contact message endpoints
//!
//! - POST /api/messages - Public contact form, limited per client IP
//! - GET /api/admin/messages - Inbox with `read` filter
//! - GET /api/admin/messages/{id} - Open (marks read)
//! - PATCH /api/admin/messages/{id}/read - Mark read or unread
//! - DELETE /api/admin/messages/{id} - Admin only

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::common::{ApiPath, ApiQuery, ValidatedJson};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ClientInfo};
use crate::models::{CreateMessageInput, ListParams, Message, PagedResult};
use crate::services::{Action, MessageServiceError, Resource};

impl From<MessageServiceError> for ApiError {
    fn from(error: MessageServiceError) -> Self {
        match error {
            MessageServiceError::NotFound => ApiError::not_found("Message not found"),
            MessageServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    pub read: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReadBody {
    pub read: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(submit_message))
}

/// Staff routes, nested under `/api/admin/messages`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_messages))
        .route("/{id}", get(open_message).delete(delete_message))
        .route("/{id}/read", patch(mark_read))
}

/// POST /api/messages
async fn submit_message(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(input): ValidatedJson<CreateMessageInput>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let limiter = &state.rate_limiters.contact_ip;
    limiter
        .check(client.rate_key())
        .await
        .map_err(ApiError::rate_limited)?;

    let message = state.messages.submit(input).await?;
    limiter.record(client.rate_key()).await;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_messages(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiQuery(query): ApiQuery<InboxQuery>,
) -> Result<Json<PagedResult<Message>>, ApiError> {
    current.require(Resource::Message, Action::Read)?;
    let params = ListParams::from_query(query.page, query.per_page);
    Ok(Json(state.messages.list(query.read, &params).await?))
}

async fn open_message(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Message>, ApiError> {
    current.require(Resource::Message, Action::Read)?;
    Ok(Json(state.messages.open(id).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(body): ValidatedJson<ReadBody>,
) -> Result<Json<Message>, ApiError> {
    current.require(Resource::Message, Action::Update)?;
    Ok(Json(state.messages.set_read(id, body.read).await?))
}

async fn delete_message(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    current.require(Resource::Message, Action::Delete)?;
    state.messages.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
