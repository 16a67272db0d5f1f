//! Cloud storage adapters.
//!
//! Currently only Amazon S3 (and S3-compatible endpoints picked up from the
//! standard AWS environment), used to fetch job inputs addressed by key.

pub mod s3;

pub use s3::{S3Config, S3ObjectStore};
