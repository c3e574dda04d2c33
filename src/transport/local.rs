//! In-process topic exchange
//!
//! Behaves like a broker's topic exchange for publishers and subscribers
//! living in the same process: every bound queue whose pattern matches a
//! routing key gets a copy of the payload. Each queue delivers through a
//! bounded buffer that drops its oldest entries when the consumer lags,
//! and messages older than the queue TTL are discarded before they reach
//! the mailbox.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::QueueOptions;
use crate::error::{Result, TransportError};

use super::mailbox::MailboxWriter;
use super::topic::{validate_routing_key, TopicPattern};
use super::MessageBus;

/// A published payload with its publish instant, for TTL checks
#[derive(Debug, Clone)]
struct Envelope {
    payload: Bytes,
    published_at: Instant,
}

struct Queue {
    id: u64,
    pattern: TopicPattern,
    sender: broadcast::Sender<Envelope>,
}

#[derive(Default)]
struct Exchange {
    queues: Vec<Queue>,
}

#[derive(Default)]
struct Inner {
    exchanges: RwLock<HashMap<String, Exchange>>,
    next_queue_id: AtomicU64,
}

/// In-process topic broker
///
/// Cheap to clone; clones share the same exchanges.
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Arc<Inner>,
}

/// A queue bound on a [`LocalBus`]
///
/// Dropping the binding stops delivery; the queue itself is removed on
/// the next publish to its exchange (auto-delete).
pub struct LocalBinding {
    exchange: String,
    queue_id: u64,
    task: JoinHandle<()>,
}

impl LocalBinding {
    pub fn queue_id(&self) -> u64 {
        self.queue_id
    }
}

impl Drop for LocalBinding {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live queues bound to an exchange
    pub async fn queue_count(&self, exchange: &str) -> usize {
        let exchanges = self.inner.exchanges.read().await;
        exchanges
            .get(exchange)
            .map(|e| e.queues.iter().filter(|q| q.sender.receiver_count() > 0).count())
            .unwrap_or(0)
    }

    /// Drop queues whose consumer went away
    async fn prune(&self, exchange: &str) {
        let mut exchanges = self.inner.exchanges.write().await;
        if let Some(entry) = exchanges.get_mut(exchange) {
            entry.queues.retain(|queue| {
                let alive = queue.sender.receiver_count() > 0;
                if !alive {
                    tracing::debug!(
                        exchange = %exchange,
                        queue = queue.id,
                        binding_key = %queue.pattern,
                        "Queue auto-deleted"
                    );
                }
                alive
            });
        }
    }
}

impl MessageBus for LocalBus {
    type Binding = LocalBinding;

    async fn declare_exchange(&self, exchange: &str) -> Result<()> {
        let mut exchanges = self.inner.exchanges.write().await;
        if !exchanges.contains_key(exchange) {
            exchanges.insert(exchange.to_string(), Exchange::default());
            tracing::info!(exchange = %exchange, "Exchange declared");
        }
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: Bytes) -> Result<()> {
        validate_routing_key(routing_key)?;

        let envelope = Envelope {
            payload,
            published_at: Instant::now(),
        };

        let mut stale = false;
        {
            let exchanges = self.inner.exchanges.read().await;
            let entry = exchanges
                .get(exchange)
                .ok_or_else(|| TransportError::ExchangeNotDeclared(exchange.to_string()))?;

            for queue in entry.queues.iter().filter(|q| q.pattern.matches(routing_key)) {
                // Err means the consumer is gone
                if queue.sender.send(envelope.clone()).is_err() {
                    stale = true;
                }
            }
        }

        if stale {
            self.prune(exchange).await;
        }
        Ok(())
    }

    async fn bind_queue(
        &self,
        exchange: &str,
        binding_key: &str,
        options: &QueueOptions,
        sink: MailboxWriter,
    ) -> Result<LocalBinding> {
        let pattern = TopicPattern::parse(binding_key)?;
        let mut exchanges = self.inner.exchanges.write().await;
        let entry = exchanges
            .get_mut(exchange)
            .ok_or_else(|| TransportError::ExchangeNotDeclared(exchange.to_string()))?;

        let queue_id = self.inner.next_queue_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = broadcast::channel(options.delivery_capacity.max(1));
        let task = tokio::spawn(deliver(receiver, sink, options.message_ttl, queue_id));

        entry.queues.push(Queue {
            id: queue_id,
            pattern,
            sender,
        });

        tracing::info!(
            exchange = %exchange,
            queue = queue_id,
            binding_key = %binding_key,
            ttl_ms = options.message_ttl.map(|t| t.as_millis() as u64),
            "Queue bound"
        );

        Ok(LocalBinding {
            exchange: exchange.to_string(),
            queue_id,
            task,
        })
    }

    async fn unbind(&self, binding: LocalBinding) -> Result<()> {
        let mut exchanges = self.inner.exchanges.write().await;
        if let Some(entry) = exchanges.get_mut(&binding.exchange) {
            entry.queues.retain(|q| q.id != binding.queue_id);
        }
        tracing::info!(
            exchange = %binding.exchange,
            queue = binding.queue_id,
            "Queue unbound"
        );
        Ok(())
    }
}

/// Move deliveries from a queue into its mailbox until either side closes
async fn deliver(
    mut receiver: broadcast::Receiver<Envelope>,
    sink: MailboxWriter,
    ttl: Option<Duration>,
    queue_id: u64,
) {
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                if ttl.is_some_and(|ttl| envelope.published_at.elapsed() > ttl) {
                    sink.record_expired();
                    tracing::debug!(queue = queue_id, "Message expired before delivery");
                    continue;
                }
                if sink.put(envelope.payload) {
                    tracing::trace!(queue = queue_id, "Unread value overwritten");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(queue = queue_id, skipped = skipped, "Consumer lagging, oldest dropped");
            }
            Err(RecvError::Closed) => break,
        }

        if sink.is_closed() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::mailbox::mailbox;

    #[tokio::test]
    async fn test_publish_requires_declared_exchange() {
        let bus = LocalBus::new();
        let result = bus.publish("nowhere", "lab.body", Bytes::from_static(b"x")).await;
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::ExchangeNotDeclared(_)))
        ));
    }

    #[tokio::test]
    async fn test_routing_by_pattern() {
        let bus = LocalBus::new();
        bus.declare_exchange("kinect").await.unwrap();

        let (body_tx, body_rx) = mailbox();
        let (gesture_tx, gesture_rx) = mailbox();
        let options = QueueOptions::default().no_ttl();
        let _b = bus.bind_queue("kinect", "*.body", &options, body_tx).await.unwrap();
        let _g = bus.bind_queue("kinect", "lab.gesture", &options, gesture_tx).await.unwrap();

        bus.publish("kinect", "lab.body", Bytes::from_static(b"body")).await.unwrap();
        bus.publish("kinect", "other.gesture", Bytes::from_static(b"nope")).await.unwrap();
        bus.publish("kinect", "lab.gesture", Bytes::from_static(b"gesture")).await.unwrap();

        assert_eq!(body_rx.recv().await, Some(Bytes::from_static(b"body")));
        assert_eq!(gesture_rx.recv().await, Some(Bytes::from_static(b"gesture")));
        assert!(!body_rx.has_value());
    }

    #[tokio::test]
    async fn test_wildcard_routing_key_rejected() {
        let bus = LocalBus::new();
        bus.declare_exchange("kinect").await.unwrap();
        let result = bus.publish("kinect", "*.body", Bytes::new()).await;
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::InvalidRoutingKey(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_messages_are_dropped() {
        let bus = LocalBus::new();
        bus.declare_exchange("kinect").await.unwrap();

        let (tx, rx) = mailbox();
        let options = QueueOptions::default().message_ttl(Duration::from_millis(30));
        let _binding = bus.bind_queue("kinect", "#", &options, tx).await.unwrap();

        bus.publish("kinect", "lab.body", Bytes::from_static(b"stale")).await.unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        bus.publish("kinect", "lab.body", Bytes::from_static(b"fresh")).await.unwrap();

        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"fresh")));
        let counters = rx.counters();
        assert_eq!(counters.expired, 1);
        assert_eq!(counters.overwritten, 0);
    }

    #[tokio::test]
    async fn test_dropped_binding_is_auto_deleted() {
        let bus = LocalBus::new();
        bus.declare_exchange("kinect").await.unwrap();

        let (tx, rx) = mailbox();
        let binding = bus
            .bind_queue("kinect", "*.body", &QueueOptions::default(), tx)
            .await
            .unwrap();
        assert_eq!(bus.queue_count("kinect").await, 1);

        drop(binding);
        // Aborted delivery task drops the mailbox writer
        assert_eq!(rx.recv().await, None);
        assert_eq!(bus.queue_count("kinect").await, 0);

        bus.publish("kinect", "lab.body", Bytes::from_static(b"x")).await.unwrap();
        let exchanges = bus.inner.exchanges.read().await;
        assert!(exchanges["kinect"].queues.is_empty());
    }

    #[tokio::test]
    async fn test_unbind_closes_mailbox() {
        let bus = LocalBus::new();
        bus.declare_exchange("kinect").await.unwrap();

        let (tx, rx) = mailbox();
        let binding = bus
            .bind_queue("kinect", "*.body", &QueueOptions::default(), tx)
            .await
            .unwrap();
        bus.unbind(binding).await.unwrap();

        assert_eq!(rx.recv().await, None);
        assert_eq!(bus.queue_count("kinect").await, 0);
    }
}
