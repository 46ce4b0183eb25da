//! Authentication service
//!
//! Email/password credentials stored as Argon2 hashes in the `accounts`
//! table, and opaque database-backed session tokens:
//! - the first user to sign up becomes admin
//! - sessions slide: a session used after `session_refresh_hours` gets a
//!   fresh expiry
//! - bans block sign-in until they expire; lapsed bans are lifted on the
//!   next sign-in

use crate::config::AuthConfig;
use crate::db::repositories::{AccountRepository, SessionRepository, UserRepository};
use crate::models::validators::{image_ref, password_length};
use crate::models::{NewUser, Session, User, UserRole};
use crate::services::password::{hash_password_blocking, verify_password_blocking};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Sign-up is disabled")]
    SignUpDisabled,

    #[error("Email is already registered: {0}")]
    EmailTaken(String),

    /// Ban in force; carries the reason shown to the user
    #[error("Account is banned")]
    Banned {
        reason: Option<String>,
        expires: Option<DateTime<Utc>>,
    },

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Body of `POST /api/auth/sign-up`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "password_length"))]
    pub password: String,
}

/// Body of `POST /api/auth/sign-in`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInInput {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    #[validate(custom(function = "password_length"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(custom(function = "image_ref"))]
    pub image: Option<String>,
}

/// Client details recorded on a new session
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    session_ttl: Duration,
    refresh_after: Duration,
    allow_sign_up: bool,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionRepository>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            accounts,
            sessions,
            session_ttl: Duration::days(config.session_ttl_days),
            refresh_after: Duration::hours(config.session_refresh_hours),
            allow_sign_up: config.allow_sign_up,
        }
    }

    /// Register a user and open a session for them.
    ///
    /// The very first user becomes admin. Afterwards sign-up must be enabled
    /// in configuration.
    pub async fn sign_up(&self, input: SignUpInput, meta: SessionMeta) -> Result<(User, Session), AuthError> {
        let first_user = self.users.count().await.context("Failed to count users")? == 0;
        if !first_user && !self.allow_sign_up {
            return Err(AuthError::SignUpDisabled);
        }

        let email = input.email.trim().to_lowercase();
        if self
            .users
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthError::EmailTaken(email));
        }

        let role = if first_user { UserRole::Admin } else { UserRole::User };
        let user = self
            .create_user_with_password(
                NewUser {
                    name: input.name.trim().to_string(),
                    email,
                    role,
                    image: None,
                },
                input.password,
            )
            .await?;

        let session = self.create_session(user.id, meta).await?;
        tracing::info!(user_id = user.id, role = %user.role, "User signed up");
        Ok((user, session))
    }

    /// Insert a user row and its credential account
    pub async fn create_user_with_password(&self, user: NewUser, password: String) -> Result<User, AuthError> {
        let hash = hash_password_blocking(password).await?;
        let user = self.users.create(&user).await.context("Failed to create user")?;
        self.accounts
            .create_credential(user.id, &hash)
            .await
            .context("Failed to store credentials")?;
        Ok(user)
    }

    pub async fn sign_in(&self, input: SignInInput, meta: SessionMeta) -> Result<(User, Session), AuthError> {
        let mut user = self
            .users
            .get_by_email(input.email.trim())
            .await
            .context("Failed to look up user")?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = self
            .accounts
            .get_credential(user.id)
            .await
            .context("Failed to load credentials")?
            .and_then(|account| account.password_hash)
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password_blocking(input.password, hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        if user.is_banned_at(now) {
            return Err(AuthError::Banned {
                reason: user.ban_reason.clone(),
                expires: user.ban_expires,
            });
        }
        if user.ban_lapsed_at(now) {
            self.users
                .set_ban(user.id, false, None, None)
                .await
                .context("Failed to lift expired ban")?;
            user.banned = false;
            user.ban_reason = None;
            user.ban_expires = None;
            tracing::info!(user_id = user.id, "Expired ban lifted");
        }

        let session = self.create_session(user.id, meta).await?;
        tracing::debug!(user_id = user.id, "User signed in");
        Ok((user, session))
    }

    /// Delete the session; unknown tokens are ignored
    pub async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete(token).await.context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a token to its user and session.
    ///
    /// Expired sessions are removed. A valid session not touched for
    /// `refresh_after` has its expiry pushed out.
    pub async fn validate_session(&self, token: &str) -> Result<Option<(User, Session)>, AuthError> {
        let Some(mut session) = self.sessions.get_by_id(token).await.context("Failed to get session")? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.sessions.delete(token).await.context("Failed to delete session")?;
            return Ok(None);
        }

        let Some(user) = self.users.get_by_id(session.user_id).await.context("Failed to get user")? else {
            return Ok(None);
        };

        let now = Utc::now();
        if user.is_banned_at(now) {
            return Ok(None);
        }

        if session.needs_refresh(now, self.refresh_after) {
            let expires_at = now + self.session_ttl;
            self.sessions
                .touch(&session.id, expires_at, now)
                .await
                .context("Failed to refresh session")?;
            session.expires_at = expires_at;
            session.updated_at = now;
        }

        Ok(Some((user, session)))
    }

    /// Replace the password and revoke every other session of the user
    pub async fn change_password(
        &self,
        user_id: i64,
        current_session: &str,
        input: ChangePasswordInput,
    ) -> Result<(), AuthError> {
        let hash = self
            .accounts
            .get_credential(user_id)
            .await
            .context("Failed to load credentials")?
            .and_then(|account| account.password_hash)
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password_blocking(input.current_password, hash).await? {
            return Err(AuthError::WrongPassword);
        }

        let new_hash = hash_password_blocking(input.new_password).await?;
        self.accounts
            .update_password(user_id, &new_hash)
            .await
            .context("Failed to update password")?;
        let revoked = self
            .sessions
            .delete_by_user_except(user_id, current_session)
            .await
            .context("Failed to revoke sessions")?;

        tracing::info!(user_id, revoked, "Password changed");
        Ok(())
    }

    pub async fn update_profile(&self, user_id: i64, input: UpdateProfileInput) -> Result<User, AuthError> {
        let image = input.image.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let updated = self
            .users
            .update_profile(user_id, input.name.trim(), image)
            .await
            .context("Failed to update profile")?;
        if !updated {
            return Err(AuthError::UserNotFound);
        }
        self.users
            .get_by_id(user_id)
            .await
            .context("Failed to reload user")?
            .ok_or(AuthError::UserNotFound)
    }

    /// Remove expired sessions, returning how many were deleted
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AuthError> {
        Ok(self
            .sessions
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn create_session(&self, user_id: i64, meta: SessionMeta) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: now + self.session_ttl,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
            created_at: now,
            updated_at: now,
        };
        self.sessions.create(&session).await.context("Failed to create session")?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::db::repositories::{SqlxAccountRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::DynDatabasePool;

    async fn setup_with(config: AuthConfig) -> (DynDatabasePool, AuthService) {
        let pool = migrated_pool().await;
        let service = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxAccountRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            &config,
        );
        (pool, service)
    }

    async fn setup() -> (DynDatabasePool, AuthService) {
        setup_with(AuthConfig {
            allow_sign_up: true,
            ..AuthConfig::default()
        })
        .await
    }

    fn sign_up_input(email: &str) -> SignUpInput {
        SignUpInput {
            name: "Desk Editor".to_string(),
            email: email.to_string(),
            password: "newsroom-2024".to_string(),
        }
    }

    fn sign_in_input(email: &str, password: &str) -> SignInInput {
        SignInInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let (_pool, service) = setup().await;

        let (first, session) = service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(session.user_id, first.id);

        let (second, _) = service
            .sign_up(sign_up_input("reader@example.com"), SessionMeta::default())
            .await
            .unwrap();
        assert_eq!(second.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_sign_up_disabled_after_first_user() {
        let (_pool, service) = setup_with(AuthConfig::default()).await;

        service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();
        let result = service
            .sign_up(sign_up_input("reader@example.com"), SessionMeta::default())
            .await;
        assert!(matches!(result, Err(AuthError::SignUpDisabled)));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (_pool, service) = setup().await;
        service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();

        let result = service
            .sign_up(sign_up_input("Chief@Example.com"), SessionMeta::default())
            .await;
        assert!(matches!(result, Err(AuthError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_sign_in_and_validate() {
        let (_pool, service) = setup().await;
        service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();

        let meta = SessionMeta {
            ip_address: Some("203.0.113.7".to_string()),
            user_agent: Some("test".to_string()),
        };
        let (user, session) = service
            .sign_in(sign_in_input("chief@example.com", "newsroom-2024"), meta)
            .await
            .unwrap();
        assert_eq!(session.ip_address.as_deref(), Some("203.0.113.7"));

        let (found, _) = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        service.sign_out(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        // signing out twice is fine
        service.sign_out(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_credentials() {
        let (_pool, service) = setup().await;
        service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();

        let wrong = service
            .sign_in(sign_in_input("chief@example.com", "wrong-password"), SessionMeta::default())
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let unknown = service
            .sign_in(sign_in_input("nobody@example.com", "newsroom-2024"), SessionMeta::default())
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_sign_in() {
        let (pool, service) = setup().await;
        let (user, _) = service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();
        SqlxUserRepository::new(pool.clone())
            .set_ban(user.id, true, Some("spam"), None)
            .await
            .unwrap();

        let result = service
            .sign_in(sign_in_input("chief@example.com", "newsroom-2024"), SessionMeta::default())
            .await;
        match result {
            Err(AuthError::Banned { reason, .. }) => assert_eq!(reason.as_deref(), Some("spam")),
            other => panic!("expected ban, got {:?}", other.map(|(u, _)| u.id)),
        }
    }

    #[tokio::test]
    async fn test_expired_ban_is_lifted_on_sign_in() {
        let (pool, service) = setup().await;
        let (user, _) = service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();
        let users = SqlxUserRepository::new(pool.clone());
        users
            .set_ban(user.id, true, Some("cool-off"), Some(Utc::now() - Duration::hours(1)))
            .await
            .unwrap();

        let (signed_in, _) = service
            .sign_in(sign_in_input("chief@example.com", "newsroom-2024"), SessionMeta::default())
            .await
            .unwrap();
        assert!(!signed_in.banned);
        assert!(!users.get_by_id(user.id).await.unwrap().unwrap().banned);
    }

    #[tokio::test]
    async fn test_stale_session_is_refreshed() {
        let (pool, service) = setup().await;
        let (user, _) = service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();

        let sessions = SqlxSessionRepository::new(pool.clone());
        let old = Utc::now() - Duration::days(2);
        let stale = Session {
            id: "stale-token".to_string(),
            user_id: user.id,
            expires_at: Utc::now() + Duration::days(1),
            ip_address: None,
            user_agent: None,
            created_at: old,
            updated_at: old,
        };
        sessions.create(&stale).await.unwrap();

        let (_, refreshed) = service.validate_session("stale-token").await.unwrap().unwrap();
        assert!(refreshed.expires_at > Utc::now() + Duration::days(6));
    }

    #[tokio::test]
    async fn test_expired_session_is_deleted() {
        let (pool, service) = setup().await;
        let (user, _) = service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();

        let sessions = SqlxSessionRepository::new(pool.clone());
        let now = Utc::now();
        sessions
            .create(&Session {
                id: "expired-token".to_string(),
                user_id: user.id,
                expires_at: now - Duration::minutes(1),
                ip_address: None,
                user_agent: None,
                created_at: now - Duration::days(8),
                updated_at: now - Duration::days(8),
            })
            .await
            .unwrap();

        assert!(service.validate_session("expired-token").await.unwrap().is_none());
        assert!(sessions.get_by_id("expired-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_revokes_other_sessions() {
        let (_pool, service) = setup().await;
        let (user, current) = service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();
        let (_, other) = service
            .sign_in(sign_in_input("chief@example.com", "newsroom-2024"), SessionMeta::default())
            .await
            .unwrap();

        let wrong = service
            .change_password(
                user.id,
                &current.id,
                ChangePasswordInput {
                    current_password: "not-it".to_string(),
                    new_password: "fresh-password".to_string(),
                },
            )
            .await;
        assert!(matches!(wrong, Err(AuthError::WrongPassword)));

        service
            .change_password(
                user.id,
                &current.id,
                ChangePasswordInput {
                    current_password: "newsroom-2024".to_string(),
                    new_password: "fresh-password".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(service.validate_session(&current.id).await.unwrap().is_some());
        assert!(service.validate_session(&other.id).await.unwrap().is_none());
        assert!(service
            .sign_in(sign_in_input("chief@example.com", "fresh-password"), SessionMeta::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (_pool, service) = setup().await;
        let (user, _) = service
            .sign_up(sign_up_input("chief@example.com"), SessionMeta::default())
            .await
            .unwrap();

        let updated = service
            .update_profile(
                user.id,
                UpdateProfileInput {
                    name: " Managing Editor ".to_string(),
                    image: Some("/uploads/me.png".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Managing Editor");
        assert_eq!(updated.image.as_deref(), Some("/uploads/me.png"));
    }

    #[test]
    fn test_sign_up_input_validation() {
        let input = SignUpInput {
            name: "A".to_string(),
            email: "nope".to_string(),
            password: "short".to_string(),
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
