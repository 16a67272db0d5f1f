//! Shared domain types for the image-analysis job pipeline.
//!
//! - [`payload`]: the inbound job message and its addressing modes.
//! - [`prediction`]: detections and the persisted prediction artifact.
//! - [`events`]: the `images.processed` domain event and callback summary.
//! - [`layout`]: on-disk layout of original and predicted images.
//! - [`traits`]: interfaces of the external collaborators (object store,
//!   inference, repository, identity store, publisher, callback).

pub mod error;
pub mod events;
pub mod layout;
pub mod payload;
pub mod prediction;
pub mod traits;
pub mod types;
