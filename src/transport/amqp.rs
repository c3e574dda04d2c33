//! AMQP 0-9-1 broker adapter (RabbitMQ), enabled by the `amqp` feature
//!
//! Subscriptions declare a server-named, exclusive, auto-delete queue with
//! an `x-message-ttl` argument, so the broker itself discards backlog the
//! consumer could not drain. Deliveries are consumed without acks and go
//! straight into the subscription's mailbox from the consumer delegate.
//!
//! Dropping an [`AmqpBinding`] without unbinding cancels its consumer and
//! deletes its queue in the background, and closes the mailbox right away.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use lapin::message::DeliveryResult;
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::config::{BrokerConfig, QueueOptions};
use crate::error::{Result, TransportError};

use super::mailbox::MailboxWriter;
use super::topic::{validate_routing_key, TopicPattern};
use super::MessageBus;

fn broker_error(e: lapin::Error) -> TransportError {
    TransportError::Broker(e.to_string())
}

/// Connection to an AMQP broker
///
/// Cheap to clone; clones share one connection and channel.
#[derive(Clone)]
pub struct AmqpBus {
    connection: Arc<Connection>,
    channel: Channel,
}

/// Mailbox writer shared with the consumer delegate
///
/// Releasing drops the writer, so the mailbox closes and later deliveries
/// go nowhere.
#[derive(Clone)]
struct DeliverySink {
    writer: Arc<Mutex<Option<MailboxWriter>>>,
}

impl DeliverySink {
    fn new(writer: MailboxWriter) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Some(writer))),
        }
    }

    fn writer(&self) -> MutexGuard<'_, Option<MailboxWriter>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, delivery: DeliveryResult) {
        match delivery {
            Ok(Some(delivery)) => {
                if let Some(writer) = self.writer().as_ref() {
                    writer.put(Bytes::from(delivery.data));
                }
            }
            // Consumer cancelled by the broker
            Ok(None) => self.release(),
            Err(e) => {
                tracing::warn!(error = %e, "Consumer delivery failed, closing mailbox");
                self.release();
            }
        }
    }

    fn release(&self) {
        let writer = self.writer().take();
        drop(writer);
    }
}

/// A consumer and its queue on the broker
pub struct AmqpBinding {
    queue: String,
    consumer_tag: String,
    channel: Channel,
    sink: DeliverySink,
    released: bool,
}

impl AmqpBinding {
    /// Server-assigned queue name
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl Drop for AmqpBinding {
    fn drop(&mut self) {
        self.sink.release();
        if self.released {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(queue = %self.queue, "Binding dropped outside a runtime, queue left on broker");
            return;
        };
        let channel = self.channel.clone();
        let queue = std::mem::take(&mut self.queue);
        let consumer_tag = std::mem::take(&mut self.consumer_tag);
        runtime.spawn(async move {
            match teardown(&channel, &consumer_tag, &queue).await {
                Ok(()) => tracing::debug!(queue = %queue, "Dropped binding torn down"),
                Err(e) => tracing::warn!(queue = %queue, error = %e, "Dropped binding teardown failed"),
            }
        });
    }
}

/// Cancel the consumer, then delete its queue
async fn teardown(channel: &Channel, consumer_tag: &str, queue: &str) -> std::result::Result<(), lapin::Error> {
    channel
        .basic_cancel(consumer_tag, BasicCancelOptions::default())
        .await?;
    channel
        .queue_delete(queue, QueueDeleteOptions::default())
        .await?;
    Ok(())
}

impl AmqpBus {
    /// Connect with the URI and credentials from `config`
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        config.validate()?;
        let connection = Connection::connect(&config.amqp_uri(), ConnectionProperties::default())
            .await
            .map_err(broker_error)?;
        let channel = connection.create_channel().await.map_err(broker_error)?;

        tracing::info!(host = %config.host, port = config.port, "Connected to broker");

        Ok(Self {
            connection: Arc::new(connection),
            channel,
        })
    }

    /// Close the channel and connection
    pub async fn close(&self) -> Result<()> {
        self.channel.close(200, "bye").await.map_err(broker_error)?;
        self.connection.close(200, "bye").await.map_err(broker_error)?;
        Ok(())
    }
}

impl MessageBus for AmqpBus {
    type Binding = AmqpBinding;

    async fn declare_exchange(&self, exchange: &str) -> Result<()> {
        self.channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(broker_error)?;
        tracing::info!(exchange = %exchange, "Exchange declared");
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: Bytes) -> Result<()> {
        validate_routing_key(routing_key)?;
        // The confirm is not awaited: delivery is best effort
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(broker_error)?;
        Ok(())
    }

    async fn bind_queue(
        &self,
        exchange: &str,
        binding_key: &str,
        options: &QueueOptions,
        sink: MailboxWriter,
    ) -> Result<AmqpBinding> {
        TopicPattern::parse(binding_key)?;

        let mut arguments = FieldTable::default();
        if let Some(ttl) = options.message_ttl {
            let ms = i32::try_from(ttl.as_millis()).unwrap_or(i32::MAX);
            arguments.insert("x-message-ttl".into(), AMQPValue::LongInt(ms));
        }

        let queue = self
            .channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: options.exclusive,
                    auto_delete: options.auto_delete,
                    ..Default::default()
                },
                arguments,
            )
            .await
            .map_err(broker_error)?;
        let queue_name = queue.name().as_str().to_string();

        self.channel
            .queue_bind(
                &queue_name,
                exchange,
                binding_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(broker_error)?;

        let consumer = self
            .channel
            .basic_consume(
                &queue_name,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_error)?;
        let consumer_tag = consumer.tag().as_str().to_string();

        let sink = DeliverySink::new(sink);
        let delegate_sink = sink.clone();
        consumer.set_delegate(move |delivery: DeliveryResult| {
            let sink = delegate_sink.clone();
            async move { sink.handle(delivery) }
        });

        tracing::info!(
            exchange = %exchange,
            queue = %queue_name,
            binding_key = %binding_key,
            ttl_ms = options.message_ttl.map(|t| t.as_millis() as u64),
            "Queue bound"
        );

        Ok(AmqpBinding {
            queue: queue_name,
            consumer_tag,
            channel: self.channel.clone(),
            sink,
            released: false,
        })
    }

    async fn unbind(&self, mut binding: AmqpBinding) -> Result<()> {
        binding.sink.release();
        // On failure the binding's drop retries in the background
        teardown(&self.channel, &binding.consumer_tag, &binding.queue)
            .await
            .map_err(broker_error)?;
        binding.released = true;
        tracing::info!(queue = %binding.queue, "Queue unbound");
        Ok(())
    }
}
