//! Authentication API endpoints
//!
//! - POST /api/auth/sign-up - Register (the first account becomes admin)
//! - POST /api/auth/sign-in - Open a session
//! - POST /api/auth/sign-out - Close the current session
//! - GET /api/auth/me - Current user
//! - PUT /api/auth/profile - Update name and avatar
//! - PUT /api/auth/password - Change password, revoking other sessions

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::common::ValidatedJson;
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser, ClientInfo};
use crate::config::AuthConfig;
use crate::models::{Session, User};
use crate::services::auth::{ChangePasswordInput, SignInInput, SignUpInput, UpdateProfileInput};
use crate::services::AuthError;

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid email or password"),
            AuthError::SignUpDisabled => ApiError::forbidden("Sign-up is disabled"),
            AuthError::EmailTaken(_) => ApiError::already_exists("Email is already registered"),
            AuthError::Banned { reason, expires } => ApiError::with_details(
                "USER_BANNED",
                "Your account has been banned",
                serde_json::json!({ "reason": reason, "expires": expires }),
            ),
            AuthError::WrongPassword => ApiError::field("current_password", "is incorrect"),
            AuthError::UserNotFound => ApiError::not_found("User not found"),
            AuthError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    /// Also set as the session cookie; bearer clients send it back themselves
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Routes open to anonymous callers
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/sign-out", post(sign_out))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

fn session_cookie(config: &AuthConfig, token: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name, token, max_age
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_headers(cookie: String) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    user: User,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let headers = cookie_headers(session_cookie(&state.auth_config, &session.id, max_age))?;
    Ok((
        status,
        headers,
        Json(AuthResponse {
            user,
            token: session.id,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/auth/sign-up
async fn sign_up(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(input): ValidatedJson<SignUpInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = state.auth.sign_up(input, client.into()).await?;
    session_response(&state, StatusCode::CREATED, user, session)
}

/// POST /api/auth/sign-in
///
/// Limited per client IP on every attempt, and per email on failures.
async fn sign_in(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(input): ValidatedJson<SignInInput>,
) -> Result<impl IntoResponse, ApiError> {
    let limiters = &state.rate_limiters;
    let ip_key = client.rate_key().to_string();
    let email_key = input.email.trim().to_lowercase();

    limiters
        .sign_in_ip
        .check(&ip_key)
        .await
        .map_err(ApiError::rate_limited)?;
    limiters
        .sign_in_email
        .check(&email_key)
        .await
        .map_err(ApiError::rate_limited)?;
    limiters.sign_in_ip.record(&ip_key).await;

    match state.auth.sign_in(input, client.into()).await {
        Ok((user, session)) => {
            limiters.sign_in_email.clear(&email_key).await;
            session_response(&state, StatusCode::OK, user, session)
        }
        Err(AuthError::InvalidCredentials) => {
            limiters.sign_in_email.record(&email_key).await;
            tracing::info!(ip = %ip_key, "Failed sign-in");
            Err(AuthError::InvalidCredentials.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/auth/sign-out
///
/// Succeeds without a session so clients can always clear the cookie.
async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers, &state.auth_config.cookie_name) {
        state.auth.sign_out(&token).await?;
    }
    let headers = cookie_headers(session_cookie(&state.auth_config, "", 0))?;
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/auth/me
async fn me(current: AuthenticatedUser) -> Json<User> {
    Json(current.user)
}

/// PUT /api/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ValidatedJson(input): ValidatedJson<UpdateProfileInput>,
) -> Result<Json<User>, ApiError> {
    let user = state.auth.update_profile(current.user.id, input).await?;
    Ok(Json(user))
}

/// PUT /api/auth/password
async fn change_password(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ValidatedJson(input): ValidatedJson<ChangePasswordInput>,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .change_password(current.user.id, &current.session_id, input)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
