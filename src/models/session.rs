//! Session and credential account models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Provider id of email + password accounts
pub const CREDENTIAL_PROVIDER: &str = "credential";

/// Database-backed login session; `id` is the bearer/cookie token
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Whether the session was last touched more than `refresh_after` ago
    pub fn needs_refresh(&self, now: DateTime<Utc>, refresh_after: Duration) -> bool {
        now - self.updated_at >= refresh_after
    }
}

/// Login method linked to a user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub provider_id: String,
    pub account_id: String,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in: Duration, touched_ago: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: "token".to_string(),
            user_id: 1,
            expires_at: now + expires_in,
            ip_address: None,
            user_agent: None,
            created_at: now - touched_ago,
            updated_at: now - touched_ago,
        }
    }

    #[test]
    fn test_is_expired() {
        assert!(!session(Duration::hours(1), Duration::zero()).is_expired());
        assert!(session(Duration::hours(-1), Duration::zero()).is_expired());
    }

    #[test]
    fn test_needs_refresh() {
        let now = Utc::now();
        let fresh = session(Duration::days(7), Duration::hours(1));
        let stale = session(Duration::days(6), Duration::hours(30));
        assert!(!fresh.needs_refresh(now, Duration::hours(24)));
        assert!(stale.needs_refresh(now, Duration::hours(24)));
    }
}
