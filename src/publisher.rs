//! Bag publisher
//!
//! Encodes frame bags and hands them to the bus under the routing key
//! `{sender_id}.{topic}`. Publishing is fire-and-forget: no acknowledgement
//! is awaited and nothing is retried. Failures are counted and returned to
//! the caller.

use std::sync::Arc;

use bytes::Bytes;

use crate::bag::FrameBag;
use crate::codec::{self, WireMessage};
use crate::config::BrokerConfig;
use crate::error::{ConfigError, Result};
use crate::stats::{PublisherCounters, PublisherStats};
use crate::transport::{MessageBus, RoutingKey};

/// Publishes bags for one sender
///
/// # Example
/// ```no_run
/// use skeleton_bus::bag::BodyBag;
/// use skeleton_bus::publisher::BagPublisher;
/// use skeleton_bus::transport::{LocalBus, BODY_TOPIC};
///
/// # async fn example() -> skeleton_bus::Result<()> {
/// let publisher = BagPublisher::new(LocalBus::new(), "kinect", "lab")?;
/// publisher.declare().await?;
/// publisher.publish_bag(BODY_TOPIC, &BodyBag::empty("sensor-1")).await?;
/// # Ok(())
/// # }
/// ```
pub struct BagPublisher<B: MessageBus> {
    bus: B,
    exchange: String,
    sender_id: String,
    counters: Arc<PublisherCounters>,
}

impl<B: MessageBus> BagPublisher<B> {
    /// Create a publisher for `sender_id` on `exchange`
    ///
    /// The sender id is the first routing word, so it may not contain dots
    /// or wildcards.
    pub fn new(bus: B, exchange: impl Into<String>, sender_id: impl Into<String>) -> Result<Self> {
        let exchange = exchange.into();
        let sender_id = sender_id.into();
        if exchange.is_empty() {
            return Err(ConfigError::MissingExchange.into());
        }
        if sender_id.is_empty() || sender_id.contains(['.', '*', '#']) {
            return Err(ConfigError::InvalidSenderId(sender_id).into());
        }

        Ok(Self {
            bus,
            exchange,
            sender_id,
            counters: Arc::new(PublisherCounters::new()),
        })
    }

    /// Create a publisher from broker configuration, generating a sender id
    /// when none is configured
    pub fn from_config(bus: B, config: &BrokerConfig) -> Result<Self> {
        config.validate()?;
        Self::new(bus, config.exchange.clone(), config.resolved_sender_id())
    }

    /// Declare the topic exchange
    pub async fn declare(&self) -> Result<()> {
        self.bus.declare_exchange(&self.exchange).await
    }

    /// Encode and publish one bag
    ///
    /// Returns the encoded size in bytes.
    pub async fn publish_bag<T: WireMessage>(&self, topic: &str, bag: &FrameBag<T>) -> Result<usize> {
        let payload = codec::encode(bag);
        let bytes = payload.len();
        self.transmit(topic, payload).await?;
        self.counters.record_published(bytes, bag.is_empty());

        tracing::debug!(
            sensor = %bag.sensor_id,
            topic = %topic,
            items = bag.len(),
            bytes = bytes,
            "Bag published"
        );
        Ok(bytes)
    }

    /// Publish an already encoded payload
    ///
    /// Empty payloads carry nothing to route and are skipped (returns 0).
    pub async fn send_raw(&self, topic: &str, payload: Bytes) -> Result<usize> {
        if payload.is_empty() {
            tracing::debug!(topic = %topic, "Skipped empty payload");
            return Ok(0);
        }
        let bytes = payload.len();
        self.transmit(topic, payload).await?;
        self.counters.record_published(bytes, false);
        Ok(bytes)
    }

    async fn transmit(&self, topic: &str, payload: Bytes) -> Result<()> {
        let routing_key = self.routing_key(topic).to_string();
        if let Err(e) = self.bus.publish(&self.exchange, &routing_key, payload).await {
            self.counters.record_error();
            return Err(e);
        }
        Ok(())
    }

    /// Routing key for a topic
    pub fn routing_key(&self, topic: &str) -> RoutingKey {
        RoutingKey::new(self.sender_id.as_str(), topic)
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn stats(&self) -> PublisherStats {
        self.counters.snapshot()
    }

    pub(crate) fn counters(&self) -> &PublisherCounters {
        &self.counters
    }
}
