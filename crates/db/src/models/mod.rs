//! Row structs for the pipeline's tables.

pub mod prediction;
pub mod user;
