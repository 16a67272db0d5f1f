//! Repository for the `users` table.

use sqlx::PgPool;

use crate::models::user::User;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, password, created_at";

/// Lookup and idempotent creation of users.
pub struct UserRepo;

impl UserRepo {
    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Return the user named `username`, inserting it with `password` if absent.
    ///
    /// Uses a single upsert so two concurrent callers with the same name
    /// both get the same row. An existing user's password is left untouched.
    pub async fn find_or_create(
        pool: &PgPool,
        username: &str,
        password: &str,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, password)
             VALUES ($1, $2)
             ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .bind(password)
            .fetch_one(pool)
            .await
    }
}
