//! API middleware
//!
//! Contains:
//! - the shared [`AppState`]
//! - the JSON error envelope returned by every handler
//! - session resolution and the role gates layered onto routers

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use validator::ValidationErrors;

use crate::cache::{create_cache, Cache};
use crate::config::{AuthConfig, Config};
use crate::db::repositories::{
    SqlxAccountRepository, SqlxBreakingNewsRepository, SqlxCategoryRepository, SqlxMessageRepository,
    SqlxPostRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    create_image_store, role_allows, Action, AuthService, BreakingNewsService, CategoryService,
    DashboardService, MessageService, PostService, RateLimiters, Resource, SessionMeta, UploadService,
    UserService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub auth_config: Arc<AuthConfig>,
    pub cache: Arc<Cache>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub posts: Arc<PostService>,
    pub categories: Arc<CategoryService>,
    pub breaking_news: Arc<BreakingNewsService>,
    pub messages: Arc<MessageService>,
    pub uploads: Arc<UploadService>,
    pub dashboard: Arc<DashboardService>,
    pub rate_limiters: Arc<RateLimiters>,
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    /// Wire repositories and services over an already migrated pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let breaking_repo = SqlxBreakingNewsRepository::boxed(pool.clone());
        let message_repo = SqlxMessageRepository::boxed(pool.clone());

        let auth = Arc::new(AuthService::new(
            user_repo.clone(),
            SqlxAccountRepository::boxed(pool.clone()),
            session_repo.clone(),
            &config.auth,
        ));
        let store = create_image_store(&config.storage)?;

        Ok(Self {
            auth_config: Arc::new(config.auth.clone()),
            users: Arc::new(UserService::new(
                user_repo.clone(),
                session_repo,
                auth.clone(),
                cache.clone(),
            )),
            posts: Arc::new(PostService::new(
                post_repo.clone(),
                category_repo.clone(),
                cache.clone(),
            )),
            categories: Arc::new(CategoryService::new(category_repo.clone(), cache.clone())),
            breaking_news: Arc::new(BreakingNewsService::new(
                breaking_repo.clone(),
                post_repo.clone(),
                cache.clone(),
            )),
            messages: Arc::new(MessageService::new(message_repo.clone())),
            uploads: Arc::new(UploadService::new(store, &config.storage)),
            dashboard: Arc::new(DashboardService::new(
                post_repo,
                category_repo,
                breaking_repo,
                message_repo,
                user_repo,
            )),
            rate_limiters: Arc::new(RateLimiters::new()),
            trusted_proxies: config.server.trusted_proxies.clone().into(),
            auth,
            cache,
            pool,
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new("ALREADY_EXISTS", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    /// 422 with `details.fields = {field: [messages]}`
    pub fn validation(fields: BTreeMap<String, Vec<String>>) -> Self {
        Self::with_details(
            "VALIDATION_ERROR",
            "Validation failed",
            serde_json::json!({ "fields": fields }),
        )
    }

    /// 422 for a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::validation(BTreeMap::from([(field.to_string(), vec![message.into()])]))
    }

    pub fn rate_limited(retry_after: i64) -> Self {
        Self::with_details(
            "RATE_LIMITED",
            "Too many requests, try again later",
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    /// The cause is logged; clients only see a generic message
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Request failed");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "BAD_REQUEST" | "ALREADY_EXISTS" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "USER_BANNED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(&self)).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = self
                .error
                .details
                .as_ref()
                .and_then(|details| details.get("retry_after"))
                .and_then(serde_json::Value::as_i64);
            if let Some(secs) = retry_after {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
        }
        response
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|error| match &error.message {
                        Some(message) => message.to_string(),
                        None => error.code.to_string(),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self::validation(fields)
    }
}

// ============================================================================
// Sessions and role gates
// ============================================================================

/// The signed-in user behind the current request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// Session token the request was authenticated with
    pub session_id: String,
}

impl AuthenticatedUser {
    /// 403 unless the user's role grants `action` on `resource`
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), ApiError> {
        if role_allows(self.user.role, resource, action) {
            Ok(())
        } else {
            Err(ApiError::forbidden("You do not have permission to do that"))
        }
    }
}

/// Result of the session lookup, stored so it runs once per request
#[derive(Clone)]
struct SessionLookup(Option<AuthenticatedUser>);

/// Extract the session token: bearer header first, then the session cookie
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Resolve the request's session, reusing an earlier lookup if one ran
pub async fn current_user(
    state: &AppState,
    request: &mut Request,
) -> Result<Option<AuthenticatedUser>, ApiError> {
    if let Some(SessionLookup(found)) = request.extensions().get::<SessionLookup>() {
        return Ok(found.clone());
    }

    let found = match extract_session_token(request.headers(), &state.auth_config.cookie_name) {
        Some(token) => state
            .auth
            .validate_session(&token)
            .await
            .map_err(ApiError::internal)?
            .map(|(user, session)| AuthenticatedUser {
                user,
                session_id: session.id,
            }),
        None => None,
    };

    request.extensions_mut().insert(SessionLookup(found.clone()));
    if let Some(user) = &found {
        request.extensions_mut().insert(user.clone());
    }
    Ok(found)
}

async fn authenticate(state: &AppState, request: &mut Request) -> Result<AuthenticatedUser, ApiError> {
    current_user(state, request)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// 401 without a valid session
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, &mut request).await?;
    Ok(next.run(request).await)
}

/// Admins and editors only
pub async fn require_staff(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = authenticate(&state, &mut request).await?;
    if !current.user.is_staff() {
        return Err(ApiError::forbidden("Staff privileges required"));
    }
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = authenticate(&state, &mut request).await?;
    if !current.user.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

// ============================================================================
// Client details
// ============================================================================

/// Caller address and user agent, used for rate limiting and session records
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Forwarding headers win over the socket peer, but only when that peer
    /// is one of `trusted_proxies`
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_proxies: &[IpAddr]) -> Self {
        let peer_ip = peer.map(|addr| addr.ip());
        let behind_proxy = peer_ip.is_some_and(|ip| trusted_proxies.contains(&ip));
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|value| value.trim().parse::<IpAddr>().ok());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok());
        let client_ip = if behind_proxy {
            forwarded.or(real_ip).or(peer_ip)
        } else {
            peer_ip
        };

        Self {
            ip: client_ip.map(|ip| ip.to_string()),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.chars().take(500).collect()),
        }
    }

    /// Key for per-IP rate limits
    pub fn rate_key(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

impl From<ClientInfo> for SessionMeta {
    fn from(client: ClientInfo) -> Self {
        SessionMeta {
            ip_address: client.ip,
            user_agent: client.user_agent,
        }
    }
}

impl FromRequestParts<AppState> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(&parts.headers, peer, &state.trusted_proxies))
    }
}
