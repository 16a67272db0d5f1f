//! Shared scalar aliases.

/// Row id of a `users` or `detection_objects` row (BIGSERIAL).
///
/// Also the type of `user_id` in job payloads and events, which is trusted
/// as given and need not name a row in this database.
pub type DbId = i64;

/// `created_at` columns, stored as `TIMESTAMPTZ` and read back in UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
