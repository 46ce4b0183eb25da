//! Database repositories
//!
//! One trait per entity plus an `Sqlx*` implementation. SQL is written once
//! with `?` placeholders, which both SQLite and MySQL accept, and rows decode
//! through the models' `FromRow` derives.

/// Run the same query body against whichever pool is configured.
///
/// `$p` is bound to the `&SqlitePool` or `&MySqlPool`; the body is compiled
/// once per backend.
macro_rules! on_backend {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool.backend() {
            $crate::db::Backend::Sqlite($p) => $body,
            $crate::db::Backend::Mysql($p) => $body,
        }
    };
}

pub mod account;
pub mod breaking_news;
pub mod category;
pub mod message;
pub mod post;
pub mod session;
pub mod user;

pub use account::{AccountRepository, SqlxAccountRepository};
pub use breaking_news::{BreakingNewsRepository, SqlxBreakingNewsRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Wrap a search term for a `LIKE ? ESCAPE '!'` comparison
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('!', "!!")
        .replace('%', "!%")
        .replace('_', "!_");
    format!("%{}%", escaped)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::{create_test_pool, migrations, Backend, DynDatabasePool};
    use chrono::Utc;

    pub async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Insert a bare user row and return its id
    pub async fn insert_user(pool: &DynDatabasePool, email: &str, role: &str) -> i64 {
        let Backend::Sqlite(p) = pool.backend() else {
            panic!("tests run on sqlite");
        };
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (name, email, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(email.split('@').next().unwrap_or(email))
        .bind(email)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .expect("Failed to insert user")
        .last_insert_rowid()
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" storm "), "%storm%");
        assert_eq!(like_pattern("50%_off!"), "%50!%!_off!!%");
    }
}
