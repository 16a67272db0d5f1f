//! The prediction worker: consumes job payloads from the work queue and
//! runs each through the [`yolo_pipeline::JobHandler`].

pub mod config;
pub mod consumer;
pub mod signal;

pub use config::WorkerConfig;
pub use consumer::{disposition, ConsumerSettings, ConsumerState, Disposition, MessageConsumer};
