//! Work-queue consumer.
//!
//! [`MessageConsumer`] holds one channel with prefetch 1, so at most one job
//! is unacknowledged at a time and jobs run strictly in sequence. Each
//! delivery is settled after its job finishes:
//!
//! | Handler result            | Settlement              |
//! |---------------------------|-------------------------|
//! | `Ok(Dropped)`             | ack                     |
//! | `Ok(Completed)`           | ack                     |
//! | `Err(_)`                  | nack, `requeue = false` |
//!
//! A shutdown request is only observed between deliveries: the in-flight
//! job always runs to completion and is settled before the channel closes.

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, Consumer};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use yolo_events::broker::{self, BrokerError};
use yolo_events::reconnect::{reconnect_loop, ReconnectConfig};
use yolo_pipeline::{JobError, JobHandler, JobOutcome};

/// Default work queue name.
pub const DEFAULT_PREDICT_QUEUE: &str = "yolo.predict";

/// Unacknowledged deliveries allowed per consumer.
pub const PREFETCH_COUNT: u16 = 1;

const CONSUMER_TAG: &str = "yolo-worker";

// ---------------------------------------------------------------------------
// Settings and state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Broker URL.
    pub url: String,
    /// Durable work queue to consume.
    pub queue: String,
    /// Exchange rejected jobs are dead-lettered to; `None` discards them.
    pub dead_letter_exchange: Option<String>,
}

/// Lifecycle of a [`MessageConsumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Establishing (or re-establishing) the broker connection.
    Connecting,
    /// Channel open, prefetch set and queue declared.
    Bound,
    /// Receiving deliveries.
    Consuming,
    /// Shutdown requested; finishing the in-flight job.
    Draining,
    Stopped,
}

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Negative acknowledgement without requeue.
    Reject,
}

/// Settlement for a handler result.
pub fn disposition(result: &Result<JobOutcome, JobError>) -> Disposition {
    match result {
        Ok(_) => Disposition::Ack,
        Err(_) => Disposition::Reject,
    }
}

// ---------------------------------------------------------------------------
// MessageConsumer
// ---------------------------------------------------------------------------

pub struct MessageConsumer {
    settings: ConsumerSettings,
    handler: JobHandler,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConsumerState>,
}

impl MessageConsumer {
    pub fn new(settings: ConsumerSettings, handler: JobHandler) -> Self {
        let (state, _) = watch::channel(ConsumerState::Connecting);
        Self {
            settings,
            handler,
            reconnect: ReconnectConfig::default(),
            state,
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Run one message body through the handler and log the result.
    pub async fn process(&self, body: &[u8]) -> Disposition {
        let result = self.handler.handle(body).await;

        match &result {
            Ok(JobOutcome::Completed(report)) => tracing::info!(
                uid = %report.artifact.uid,
                detection_count = report.artifact.detection_count(),
                callback = ?report.callback,
                published = report.published,
                "Job completed"
            ),
            Ok(JobOutcome::Dropped { uid, reason }) => {
                tracing::info!(uid, reason = %reason, "Job dropped, acknowledging")
            }
            Err(e) => tracing::error!(error = %e, "Job failed, rejecting message"),
        }

        disposition(&result)
    }

    /// Consume until `shutdown` fires, reconnecting with backoff whenever
    /// the connection or delivery stream is lost.
    pub async fn run(self, shutdown: CancellationToken) {
        let queue = self.settings.queue.clone();

        'session: loop {
            self.transition(ConsumerState::Connecting);

            let Some((conn, channel, mut deliveries)) =
                reconnect_loop(&queue, &self.reconnect, &shutdown, || self.open()).await
            else {
                break 'session;
            };

            self.transition(ConsumerState::Consuming);
            tracing::info!(queue = %queue, "Waiting for jobs");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        self.transition(ConsumerState::Draining);
                        close(&queue, channel, conn).await;
                        break 'session;
                    }
                    next = deliveries.next() => match next {
                        Some(Ok(delivery)) => {
                            let outcome = self.process(&delivery.data).await;
                            if let Err(e) = settle(&delivery, outcome).await {
                                tracing::warn!(queue = %queue, error = %e, "Failed to settle delivery, reconnecting");
                                continue 'session;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(queue = %queue, error = %e, "Delivery stream failed, reconnecting");
                            continue 'session;
                        }
                        None => {
                            tracing::warn!(queue = %queue, "Delivery stream ended, reconnecting");
                            continue 'session;
                        }
                    }
                }
            }
        }

        self.transition(ConsumerState::Stopped);
        tracing::info!(queue = %queue, "Consumer stopped");
    }

    // ---- private helpers ----

    fn transition(&self, next: ConsumerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "Consumer state changed");
        }
    }

    /// Connect, set prefetch, declare the work queue and start consuming.
    async fn open(&self) -> Result<(Connection, Channel, Consumer), BrokerError> {
        let conn = broker::connect(&self.settings.url).await?;
        let channel = conn.create_channel().await?;
        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await?;
        broker::declare_durable_queue(
            &channel,
            &self.settings.queue,
            self.settings.dead_letter_exchange.as_deref(),
        )
        .await?;
        self.transition(ConsumerState::Bound);

        let consumer = channel
            .basic_consume(
                &self.settings.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok((conn, channel, consumer))
    }
}

async fn settle(delivery: &Delivery, disposition: Disposition) -> Result<(), lapin::Error> {
    match disposition {
        Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
        Disposition::Reject => {
            delivery
                .nack(BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                })
                .await
        }
    }
}

async fn close(queue: &str, channel: Channel, conn: Connection) {
    if let Err(e) = channel.close(200, "OK").await {
        tracing::debug!(queue, error = %e, "Error closing channel");
    }
    if let Err(e) = conn.close(200, "OK").await {
        tracing::debug!(queue, error = %e, "Error closing connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yolo_pipeline::InputError;

    #[test]
    fn dropped_jobs_are_acked() {
        let result = Ok(JobOutcome::Dropped {
            uid: "abc".into(),
            reason: InputError::Unsupported,
        });
        assert_eq!(disposition(&result), Disposition::Ack);
    }

    #[test]
    fn failed_jobs_are_rejected() {
        let decode = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let result = Err(JobError::Decode(decode));
        assert_eq!(disposition(&result), Disposition::Reject);
    }
}
