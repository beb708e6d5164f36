//! AMQP broker client
//!
//! Connects to an AMQP 0-9-1 broker using the lapin crate. Copies are
//! published through the default exchange with the queue name as routing key,
//! as persistent, mandatory messages under publisher confirms, so an
//! unroutable or refused copy surfaces as a publish error.

use std::collections::BTreeMap;

use bytes::Bytes;
use contracts::{
    AckMode, BrokerConfig, ContractError, DeliveryTag, Message, MessagePublisher, MessageSource,
    QueueName,
};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{debug, info, instrument, warn};

/// AMQP delivery mode for messages that survive a broker restart
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Unacknowledged deliveries buffered when acking on hand-off
const AUTO_ACK_PREFETCH: u16 = 32;

/// One delivery in flight while the relay settles messages itself
const MANUAL_ACK_PREFETCH: u16 = 1;

/// How a consumer settles deliveries for a given [`AckMode`]
///
/// The broker never acks on its own (`no_ack` stays false): deliveries still
/// buffered on the client when the channel closes go back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConsumeSettings {
    prefetch: u16,
    /// Ack inside `next()`, right before the message is handed over
    ack_on_handoff: bool,
}

impl ConsumeSettings {
    fn for_mode(ack_mode: AckMode) -> Self {
        match ack_mode {
            AckMode::Auto => Self {
                prefetch: AUTO_ACK_PREFETCH,
                ack_on_handoff: true,
            },
            AckMode::AfterDispatch => Self {
                prefetch: MANUAL_ACK_PREFETCH,
                ack_on_handoff: false,
            },
        }
    }
}

/// Connected AMQP broker
///
/// Owns the connection for the process lifetime; call [`AmqpBroker::close`]
/// on shutdown.
pub struct AmqpBroker {
    url: String,
    connection_name: String,
    connection: Connection,
    publish_channel: Channel,
}

impl AmqpBroker {
    /// Open a connection and a confirm-mode publishing channel
    ///
    /// # Errors
    /// Returns [`ContractError::BrokerConnection`] when the broker cannot be
    /// reached or refuses the handshake
    #[instrument(
        name = "amqp_broker_connect",
        skip(config),
        fields(url = %config.redacted_url(), connection_name = %config.connection_name)
    )]
    pub async fn connect(config: &BrokerConfig) -> Result<Self, ContractError> {
        let url = config.redacted_url();
        let properties = ConnectionProperties::default()
            .with_connection_name(config.connection_name.clone().into());

        let connection = Connection::connect(&config.url, properties)
            .await
            .map_err(|e| ContractError::broker_connection(&url, e.to_string()))?;

        let publish_channel = connection
            .create_channel()
            .await
            .map_err(|e| ContractError::broker_connection(&url, e.to_string()))?;
        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| ContractError::broker_connection(&url, e.to_string()))?;

        info!(url = %url, "Connected to broker");

        Ok(Self {
            url,
            connection_name: config.connection_name.clone(),
            connection,
            publish_channel,
        })
    }

    /// Declare a durable queue (idempotent)
    #[instrument(name = "amqp_broker_declare", skip(self), fields(queue = %queue))]
    pub async fn declare(&self, queue: &QueueName) -> Result<(), ContractError> {
        self.publish_channel
            .queue_declare(
                queue.as_str(),
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ContractError::broker_connection(&self.url, format!("declare '{queue}': {e}"))
            })?;
        debug!(queue = %queue, "Queue declared");
        Ok(())
    }

    /// Start consuming `queue` on a dedicated channel
    ///
    /// In [`AckMode::Auto`] a delivery is acknowledged when `next()` hands it
    /// to the caller; otherwise it stays unacknowledged until the relay
    /// settles it, with one message in flight at a time.
    #[instrument(name = "amqp_broker_consumer", skip(self), fields(queue = %queue))]
    pub async fn consumer(
        &self,
        queue: &QueueName,
        ack_mode: AckMode,
    ) -> Result<AmqpConsumer, ContractError> {
        let to_consume_error =
            |e: lapin::Error| ContractError::consume(queue.as_str(), e.to_string());

        let settings = ConsumeSettings::for_mode(ack_mode);
        let channel = self.connection.create_channel().await.map_err(to_consume_error)?;
        channel
            .basic_qos(settings.prefetch, BasicQosOptions::default())
            .await
            .map_err(to_consume_error)?;

        let consumer_tag = format!("{}:{}", self.connection_name, queue);
        let consumer = channel
            .basic_consume(
                queue.as_str(),
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(to_consume_error)?;

        info!(
            queue = %queue,
            ack_mode = ?ack_mode,
            prefetch = settings.prefetch,
            consumer_tag = %consumer_tag,
            "Consumer started"
        );

        Ok(AmqpConsumer {
            queue: queue.clone(),
            channel,
            consumer,
            ack_on_handoff: settings.ack_on_handoff,
        })
    }

    /// Publisher sharing the confirm-mode channel
    pub fn publisher(&self) -> AmqpPublisher {
        AmqpPublisher {
            channel: self.publish_channel.clone(),
        }
    }

    /// Close the connection and every channel on it
    #[instrument(name = "amqp_broker_close", skip(self))]
    pub async fn close(self) -> Result<(), ContractError> {
        self.connection
            .close(200, "relay shutdown")
            .await
            .map_err(|e| ContractError::broker_connection(&self.url, e.to_string()))?;
        info!(url = %self.url, "Broker connection closed");
        Ok(())
    }
}

/// Consumer bound to one source queue
pub struct AmqpConsumer {
    queue: QueueName,
    channel: Channel,
    consumer: Consumer,
    ack_on_handoff: bool,
}

impl MessageSource for AmqpConsumer {
    fn queue(&self) -> &QueueName {
        &self.queue
    }

    async fn next(&mut self) -> Option<Result<Message, ContractError>> {
        let delivery = match self.consumer.next().await? {
            Ok(delivery) => delivery,
            Err(e) => {
                return Some(Err(ContractError::consume(
                    self.queue.as_str(),
                    e.to_string(),
                )))
            }
        };

        if self.ack_on_handoff {
            let tag = delivery.delivery_tag;
            if let Err(e) = self.channel.basic_ack(tag, BasicAckOptions::default()).await {
                // Unacked, so the broker redelivers it once the channel is gone
                return Some(Err(ContractError::acknowledge(tag, e.to_string())));
            }
        }

        Some(Ok(to_message(&self.queue, delivery)))
    }

    async fn ack(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError> {
        if self.ack_on_handoff {
            return Ok(());
        }
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| ContractError::acknowledge(delivery_tag, e.to_string()))
    }

    async fn reject(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError> {
        if self.ack_on_handoff {
            return Ok(());
        }
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue: false })
            .await
            .map_err(|e| ContractError::acknowledge(delivery_tag, e.to_string()))
    }
}

/// Publisher using publisher confirms
#[derive(Clone)]
pub struct AmqpPublisher {
    channel: Channel,
}

impl MessagePublisher for AmqpPublisher {
    #[instrument(
        name = "amqp_publish",
        skip(self, body),
        fields(queue = %queue, bytes = body.len())
    )]
    async fn publish(&self, queue: &QueueName, body: Bytes) -> Result<(), ContractError> {
        let to_publish_error =
            |e: lapin::Error| ContractError::publish(queue.as_str(), e.to_string());

        let confirm = self
            .channel
            .basic_publish(
                "",
                queue.as_str(),
                BasicPublishOptions {
                    mandatory: true,
                    ..Default::default()
                },
                &body,
                BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE),
            )
            .await
            .map_err(to_publish_error)?
            .await
            .map_err(to_publish_error)?;

        match confirm {
            Confirmation::Ack(None) | Confirmation::NotRequested => Ok(()),
            Confirmation::Ack(Some(returned)) => {
                warn!(
                    queue = %queue,
                    reply_code = returned.reply_code,
                    "Copy returned as unroutable"
                );
                Err(ContractError::publish(
                    queue.as_str(),
                    format!("unroutable: {}", returned.reply_text.as_str()),
                ))
            }
            Confirmation::Nack(_) => Err(ContractError::publish(
                queue.as_str(),
                "broker refused the copy",
            )),
        }
    }
}

fn to_message(queue: &QueueName, delivery: Delivery) -> Message {
    let headers = delivery
        .properties
        .headers()
        .as_ref()
        .map(|table| {
            table
                .inner()
                .iter()
                .map(|(key, value)| (key.as_str().to_string(), header_value(value)))
                .collect()
        })
        .unwrap_or_else(BTreeMap::new);

    Message {
        body: Some(Bytes::from(delivery.data)),
        headers,
        delivery_tag: delivery.delivery_tag,
        source: queue.clone(),
    }
}

fn header_value(value: &AMQPValue) -> String {
    match value {
        AMQPValue::LongString(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        AMQPValue::ShortString(s) => s.as_str().to_string(),
        other => format!("{other:?}"),
    }
}
