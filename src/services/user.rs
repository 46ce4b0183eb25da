//! User administration
//!
//! Admin-only management of accounts: listing, creating staff, changing
//! roles, banning and deleting. An admin can never act on their own account
//! here, so the last admin cannot lock themselves out.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::validators::password_length;
use crate::models::{ListParams, NewUser, PagedResult, User, UserFilter, UserRole};
use crate::services::auth::{AuthError, AuthService};
use crate::services::{breaking_news, category};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("User not found")]
    NotFound,

    /// An admin tried to change, ban or delete their own account
    #[error("You cannot {0} your own account")]
    SelfModification(&'static str),

    #[error("Email is already registered: {0}")]
    EmailTaken(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Body of `POST /api/admin/users`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "password_length"))]
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Body of `PUT /api/admin/users/{id}/role`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRoleInput {
    pub role: UserRole,
}

/// Body of `POST /api/admin/users/{id}/ban`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BanInput {
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
    /// Omitted for a permanent ban
    #[validate(range(min = 1, max = 3650, message = "must be between 1 and 3650 days"))]
    pub expires_in_days: Option<i64>,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    auth: Arc<AuthService>,
    cache: Arc<Cache>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        auth: Arc<AuthService>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            users,
            sessions,
            auth,
            cache,
        }
    }

    pub async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self.users.list(filter, params).await.context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<User, UserServiceError> {
        self.users
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn create(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let email = input.email.trim().to_lowercase();
        if self.users.get_by_email(&email).await.context("Failed to check email")?.is_some() {
            return Err(UserServiceError::EmailTaken(email));
        }

        let user = self
            .auth
            .create_user_with_password(
                NewUser {
                    name: input.name.trim().to_string(),
                    email,
                    role: input.role,
                    image: None,
                },
                input.password,
            )
            .await?;
        tracing::info!(user_id = user.id, role = %user.role, "User created by admin");
        Ok(user)
    }

    pub async fn set_role(&self, actor: &User, id: i64, role: UserRole) -> Result<User, UserServiceError> {
        ensure_not_self(actor, id, "change the role of")?;
        if !self.users.update_role(id, role).await.context("Failed to update role")? {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!(actor = actor.id, user_id = id, role = %role, "Role changed");
        self.get(id).await
    }

    /// Ban a user and revoke all of their sessions
    pub async fn ban(&self, actor: &User, id: i64, input: BanInput) -> Result<User, UserServiceError> {
        ensure_not_self(actor, id, "ban")?;
        let reason = input.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let expires = input.expires_in_days.map(|days| Utc::now() + Duration::days(days));

        if !self
            .users
            .set_ban(id, true, reason, expires)
            .await
            .context("Failed to ban user")?
        {
            return Err(UserServiceError::NotFound);
        }
        let revoked = self
            .sessions
            .delete_by_user(id)
            .await
            .context("Failed to revoke sessions")?;

        tracing::info!(actor = actor.id, user_id = id, revoked, "User banned");
        self.get(id).await
    }

    pub async fn unban(&self, actor: &User, id: i64) -> Result<User, UserServiceError> {
        ensure_not_self(actor, id, "unban")?;
        if !self
            .users
            .set_ban(id, false, None, None)
            .await
            .context("Failed to unban user")?
        {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!(actor = actor.id, user_id = id, "User unbanned");
        self.get(id).await
    }

    /// Delete a user with their sessions and posts
    ///
    /// Post counts and ticker links may point at the removed posts, so both
    /// caches are dropped.
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), UserServiceError> {
        ensure_not_self(actor, id, "delete")?;
        if !self.users.delete(id).await.context("Failed to delete user")? {
            return Err(UserServiceError::NotFound);
        }
        for prefix in [category::CACHE_PREFIX, breaking_news::CACHE_PREFIX] {
            if let Err(e) = self.cache.delete_prefix(prefix).await {
                tracing::warn!("Failed to invalidate {} cache: {}", prefix, e);
            }
        }
        tracing::info!(actor = actor.id, user_id = id, "User deleted");
        Ok(())
    }
}

fn ensure_not_self(actor: &User, target: i64, action: &'static str) -> Result<(), UserServiceError> {
    if actor.id == target {
        return Err(UserServiceError::SelfModification(action));
    }
    Ok(())
}
