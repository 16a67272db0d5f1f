//! User entity model.

use sqlx::FromRow;
use yolo_core::types::{DbId, Timestamp};

/// Username of the shared owner for jobs that carry no identity.
pub const ANONYMOUS_USERNAME: &str = "__anonymous__";

/// Password stored for accounts created without credentials.
pub const PLACEHOLDER_PASSWORD: &str = "__none__";

/// Full user row from the `users` table.
///
/// Contains the password -- never log or serialize this struct as a whole.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub password: String,
    pub created_at: Timestamp,
}
