//! Broker plumbing and outbound notifications.
//!
//! - [`broker`]: AMQP connection and topology helpers.
//! - [`reconnect`]: exponential-backoff reconnection shared by every
//!   long-running consumer.
//! - [`publisher`]: [`AmqpEventPublisher`], publishes `images.processed`.
//! - [`callback`]: [`CallbackDispatcher`], POSTs the job summary.
//! - [`consumers`]: billing and analytics consumers of the domain event.

pub mod broker;
pub mod callback;
pub mod config;
pub mod consumers;
pub mod publisher;
pub mod reconnect;

pub use broker::BrokerError;
pub use callback::CallbackDispatcher;
pub use config::BrokerConfig;
pub use consumers::{AnalyticsTally, BillingLedger, DownstreamConsumer, EventSink};
pub use publisher::AmqpEventPublisher;
pub use reconnect::{next_delay, reconnect_loop, ReconnectConfig};
