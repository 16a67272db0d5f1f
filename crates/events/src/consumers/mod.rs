//! Downstream consumers of the `images.processed` domain event.
//!
//! [`DownstreamConsumer`] owns the broker side (queue binding, reconnect,
//! ack); an [`EventSink`] decides what to do with each decoded event.
//! Every delivery is acked, including ones that fail to decode: events are
//! best-effort and a bad body is this consumer's problem, not the broker's.

mod analytics;
mod billing;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::FieldTable;
use lapin::{Connection, Consumer};
use tokio_util::sync::CancellationToken;
use yolo_core::events::{ImageProcessedEvent, IMAGES_PROCESSED};

use crate::broker::{self, BrokerError};
use crate::config::BrokerConfig;
use crate::reconnect::{reconnect_loop, ReconnectConfig};

pub use analytics::{AnalyticsTally, ANALYTICS_QUEUE};
pub use billing::{BillingLedger, BILLING_QUEUE};

/// Receives decoded domain events.
pub trait EventSink: Send {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Durable queue this sink consumes from.
    fn queue(&self) -> &'static str;

    fn record(&mut self, event: &ImageProcessedEvent);
}

/// Running counts kept by every sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub events: u64,
    pub detections: u64,
}

impl Totals {
    pub fn add(&mut self, event: &ImageProcessedEvent) {
        self.events += 1;
        self.detections += event.detection_count as u64;
    }
}

// ---------------------------------------------------------------------------
// DownstreamConsumer
// ---------------------------------------------------------------------------

/// Consumes one queue bound to the events exchange and feeds an [`EventSink`].
pub struct DownstreamConsumer<S> {
    config: BrokerConfig,
    reconnect: ReconnectConfig,
    sink: S,
}

impl<S: EventSink> DownstreamConsumer<S> {
    pub fn new(config: BrokerConfig, sink: S) -> Self {
        Self {
            config,
            reconnect: ReconnectConfig::default(),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Decode one delivery body and hand it to the sink.
    ///
    /// Returns `false` (after logging) if the body is not a valid event.
    pub fn dispatch(&mut self, body: &[u8]) -> bool {
        match serde_json::from_slice::<ImageProcessedEvent>(body) {
            Ok(event) => {
                self.sink.record(&event);
                true
            }
            Err(e) => {
                tracing::warn!(
                    consumer = self.sink.name(),
                    error = %e,
                    body = %String::from_utf8_lossy(body),
                    "Discarding undecodable event"
                );
                false
            }
        }
    }

    /// Consume until `cancel` fires, reconnecting whenever the connection
    /// or the delivery stream is lost.
    pub async fn run(mut self, cancel: CancellationToken) {
        let queue = self.sink.queue();

        loop {
            let Some((conn, mut deliveries)) =
                reconnect_loop(queue, &self.reconnect, &cancel, || self.open()).await
            else {
                break;
            };

            tracing::info!(
                consumer = self.sink.name(),
                queue,
                routing_key = IMAGES_PROCESSED,
                "Downstream consumer waiting for events"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        if let Err(e) = conn.close(200, "OK").await {
                            tracing::debug!(queue, error = %e, "Error closing consumer connection");
                        }
                        tracing::info!(consumer = self.sink.name(), "Downstream consumer stopped");
                        return;
                    }
                    next = deliveries.next() => match next {
                        Some(Ok(delivery)) => {
                            self.dispatch(&delivery.data);
                            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                                tracing::warn!(queue, error = %e, "Ack failed, reconnecting");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(queue, error = %e, "Delivery stream failed, reconnecting");
                            break;
                        }
                        None => {
                            tracing::warn!(queue, "Delivery stream ended, reconnecting");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(consumer = self.sink.name(), "Downstream consumer stopped");
    }

    /// Connect, bind the sink's queue and start consuming.
    async fn open(&self) -> Result<(Connection, Consumer), BrokerError> {
        let conn = broker::connect(&self.config.url).await?;
        let channel = conn.create_channel().await?;
        broker::declare_bound_queue(
            &channel,
            &self.config.exchange,
            self.sink.queue(),
            IMAGES_PROCESSED,
        )
        .await?;
        let consumer = channel
            .basic_consume(
                self.sink.queue(),
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok((conn, consumer))
    }
}
