//! AMQP connection and topology helpers.
//!
//! Every declaration here is idempotent: the worker, the publisher and the
//! downstream consumers each declare what they use on their own channel, so
//! any of them can start first.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};

/// Queue argument naming the exchange rejected messages are routed to.
pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";

/// Errors from the broker layer.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    /// Channel, declaration, publish or ack failure on an open connection.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The broker negatively acknowledged a published message.
    #[error("Broker rejected the message")]
    Rejected,
}

/// Open a connection to `url`.
pub async fn connect(url: &str) -> Result<Connection, BrokerError> {
    Connection::connect(url, ConnectionProperties::default())
        .await
        .map_err(BrokerError::Connect)
}

/// Declare the durable topic exchange carrying domain events.
pub async fn declare_events_exchange(channel: &Channel, exchange: &str) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Declare a durable queue, optionally dead-lettering rejected messages to
/// `dead_letter_exchange`.
pub async fn declare_durable_queue(
    channel: &Channel,
    queue: &str,
    dead_letter_exchange: Option<&str>,
) -> Result<(), BrokerError> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            queue_arguments(dead_letter_exchange),
        )
        .await?;
    Ok(())
}

/// Declare `queue` and bind it to `exchange` under `routing_key`.
pub async fn declare_bound_queue(
    channel: &Channel,
    exchange: &str,
    queue: &str,
    routing_key: &str,
) -> Result<(), BrokerError> {
    declare_events_exchange(channel, exchange).await?;
    declare_durable_queue(channel, queue, None).await?;
    channel
        .queue_bind(
            queue,
            exchange,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Arguments for a work-queue declaration.
pub fn queue_arguments(dead_letter_exchange: Option<&str>) -> FieldTable {
    let mut args = FieldTable::default();
    if let Some(exchange) = dead_letter_exchange {
        args.insert(
            DEAD_LETTER_EXCHANGE_ARG.into(),
            AMQPValue::LongString(exchange.into()),
        );
    }
    args
}
