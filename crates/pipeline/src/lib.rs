//! The image-analysis job pipeline.
//!
//! [`JobHandler`] runs one job end to end: it resolves the input image
//! through the [`InputResolver`], runs inference, records the owner's
//! prediction, then notifies the callback target and publishes the
//! `images.processed` event. Transport (ack/nack) is the caller's concern;
//! the handler only reports what happened.

pub mod handler;
pub mod resolver;

pub use handler::{CallbackStatus, Collaborators, JobError, JobHandler, JobOutcome, JobReport};
pub use resolver::{InputError, InputResolver};
