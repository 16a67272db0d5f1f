//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod prediction_repo;
pub mod user_repo;

pub use prediction_repo::PredictionRepo;
pub use user_repo::UserRepo;
