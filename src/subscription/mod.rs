//! Last-value subscriptions
//!
//! A subscription binds a private queue to the exchange and keeps only the
//! freshest undelivered message. Older messages are replaced without
//! notice; consumers always observe "now" and may miss frames in between.
//! Messages stay as raw bytes until read, so the delivery path is a single
//! slot swap.

mod state;

pub use state::SubscriptionState;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;

use crate::bag::{BodyBag, GestureBag};
use crate::codec::{self, WireMessage};
use crate::config::QueueOptions;
use crate::error::{Error, Result};
use crate::stats::SubscriptionStats;
use crate::transport::{mailbox, MailboxReader, MessageBus};

/// Subscription yielding body bags
pub type BodySubscription<B> = LastValueSubscription<B, BodyBag>;

/// Subscription yielding gesture bags
pub type GestureSubscription<B> = LastValueSubscription<B, GestureBag>;

/// Single-slot, freshest-wins subscription
///
/// # Example
/// ```no_run
/// use skeleton_bus::config::QueueOptions;
/// use skeleton_bus::subscription::BodySubscription;
/// use skeleton_bus::transport::LocalBus;
///
/// # async fn example(bus: LocalBus) -> skeleton_bus::Result<()> {
/// let bodies = BodySubscription::bind(bus, "kinect", "*.body", &QueueOptions::default()).await?;
/// loop {
///     let bag = bodies.dequeue().await?;
///     println!("{} bodies from {}", bag.len(), bag.sensor_id);
/// }
/// # }
/// ```
pub struct LastValueSubscription<B: MessageBus, T> {
    bus: B,
    binding: Option<B::Binding>,
    reader: MailboxReader,
    binding_key: String,
    poll_interval: Duration,
    delivered: AtomicU64,
    decode_errors: AtomicU64,
    _message: PhantomData<fn() -> T>,
}

impl<B: MessageBus, T: WireMessage> LastValueSubscription<B, T> {
    /// Bind a new queue on `exchange` with `binding_key`
    pub async fn bind(
        bus: B,
        exchange: &str,
        binding_key: &str,
        options: &QueueOptions,
    ) -> Result<Self> {
        options.validate()?;
        let (writer, reader) = mailbox();
        let binding = bus.bind_queue(exchange, binding_key, options, writer).await?;

        tracing::info!(
            exchange = %exchange,
            binding_key = %binding_key,
            "Subscription bound"
        );

        Ok(Self {
            bus,
            binding: Some(binding),
            reader,
            binding_key: binding_key.to_string(),
            poll_interval: options.poll_interval,
            delivered: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            _message: PhantomData,
        })
    }

    /// Wait for the freshest message and decode it
    ///
    /// Has no timeout of its own; race it against a cancellation signal
    /// when a bounded wait is needed. Returns [`Error::Closed`] once the
    /// subscription is disposed or the broker side goes away.
    pub async fn dequeue(&self) -> Result<T> {
        match self.reader.recv().await {
            Some(payload) => self.decode(payload),
            None => Err(Error::Closed),
        }
    }

    /// Blocking variant of [`dequeue`](Self::dequeue) for threads outside
    /// the async runtime
    ///
    /// Sleeps `poll_interval` between checks rather than spinning.
    pub fn dequeue_blocking(&self) -> Result<T> {
        loop {
            if let Some(payload) = self.reader.take() {
                return self.decode(payload);
            }
            if self.reader.is_closed() {
                return Err(Error::Closed);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Take the freshest message if one is waiting
    ///
    /// Never blocks. `Ok(None)` when the slot is empty; [`Error::Closed`]
    /// after disposal.
    pub fn poll(&self) -> Result<Option<T>> {
        match self.reader.take() {
            Some(payload) => self.decode(payload).map(Some),
            None if self.reader.is_closed() => Err(Error::Closed),
            None => Ok(None),
        }
    }

    /// Whether a message is waiting
    pub fn has_pending(&self) -> bool {
        self.reader.has_value()
    }

    pub fn state(&self) -> SubscriptionState {
        if self.binding.is_none() || self.reader.is_closed() {
            SubscriptionState::Disposed
        } else if self.reader.has_value() {
            SubscriptionState::Full
        } else {
            SubscriptionState::Empty
        }
    }

    pub fn binding_key(&self) -> &str {
        &self.binding_key
    }

    pub fn stats(&self) -> SubscriptionStats {
        SubscriptionStats::new(
            self.reader.counters(),
            self.delivered.load(Ordering::Relaxed),
            self.decode_errors.load(Ordering::Relaxed),
        )
    }

    /// Unbind the queue and drop any waiting message
    ///
    /// Idempotent. The subscription stays in [`SubscriptionState::Disposed`].
    pub async fn dispose(&mut self) -> Result<()> {
        self.reader.close();
        if let Some(binding) = self.binding.take() {
            self.bus.unbind(binding).await?;
            tracing::info!(binding_key = %self.binding_key, "Subscription disposed");
        }
        Ok(())
    }

    /// Decoding runs outside the slot lock; a bad message leaves the slot empty
    fn decode(&self, payload: Bytes) -> Result<T> {
        match codec::decode(payload) {
            Ok(message) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(message)
            }
            Err(e) => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(binding_key = %self.binding_key, error = %e, "Dropped undecodable message");
                Err(e.into())
            }
        }
    }
}

impl<B: MessageBus, T> Drop for LastValueSubscription<B, T> {
    fn drop(&mut self) {
        // The binding's own drop releases the broker side
        self.reader.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::body::BodyRecord;
    use crate::error::CodecError;
    use crate::transport::LocalBus;

    const EXCHANGE: &str = "kinect";

    async fn setup() -> (LocalBus, BodySubscription<LocalBus>) {
        let bus = LocalBus::new();
        bus.declare_exchange(EXCHANGE).await.unwrap();
        let options = QueueOptions::default().no_ttl();
        let sub = BodySubscription::bind(bus.clone(), EXCHANGE, "*.body", &options)
            .await
            .unwrap();
        (bus, sub)
    }

    async fn send(bus: &LocalBus, sensor: &str, bodies: usize) {
        let items = (0..bodies as u64).map(|id| BodyRecord::with_skeleton(sensor, id)).collect();
        let payload = codec::encode(&BodyBag::new(sensor, items));
        bus.publish(EXCHANGE, "lab.body", payload).await.unwrap();
    }

    async fn wait_received<T: WireMessage>(sub: &LastValueSubscription<LocalBus, T>, n: u64) {
        timeout(Duration::from_secs(1), async {
            while sub.stats().received < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_poll_returns_latest_once() {
        let (bus, sub) = setup().await;
        send(&bus, "A", 1).await;
        send(&bus, "B", 2).await;
        send(&bus, "C", 3).await;
        wait_received(&sub, 3).await;

        assert_eq!(sub.state(), SubscriptionState::Full);
        let bag = sub.poll().unwrap().unwrap();
        assert_eq!(bag.sensor_id, "C");
        assert_eq!(bag.len(), 3);
        assert!(sub.poll().unwrap().is_none());

        let stats = sub.stats();
        assert_eq!(stats.overwritten, 2);
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn test_poll_on_empty_is_idempotent() {
        let (_bus, sub) = setup().await;
        for _ in 0..100 {
            assert!(sub.poll().unwrap().is_none());
        }
        assert_eq!(sub.state(), SubscriptionState::Empty);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_arrival() {
        let (bus, sub) = setup().await;

        let mut dequeue = task::spawn(sub.dequeue());
        assert_pending!(dequeue.poll());
        tokio::task::yield_now().await;
        assert_pending!(dequeue.poll());

        send(&bus, "A", 1).await;
        timeout(Duration::from_secs(1), async {
            while !dequeue.is_woken() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let bag = assert_ready!(dequeue.poll()).unwrap();
        assert_eq!(bag.sensor_id, "A");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dequeue_blocking() {
        let (bus, sub) = setup().await;

        let waiter = tokio::task::spawn_blocking(move || {
            let result = sub.dequeue_blocking();
            (sub, result)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        send(&bus, "A", 2).await;

        let (_sub, result) = timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
        assert_eq!(result.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_decode_error_leaves_slot_empty() {
        let (bus, sub) = setup().await;
        bus.publish(EXCHANGE, "lab.body", Bytes::from_static(&[0x12, 0x09, 0x0A]))
            .await
            .unwrap();
        wait_received(&sub, 1).await;

        let result = sub.poll();
        assert!(matches!(
            result,
            Err(Error::Codec(CodecError::LengthOverflow))
        ));
        assert!(sub.poll().unwrap().is_none());
        assert_eq!(sub.stats().decode_errors, 1);

        // The next good message still arrives
        send(&bus, "B", 1).await;
        wait_received(&sub, 2).await;
        assert_eq!(sub.poll().unwrap().unwrap().sensor_id, "B");
    }

    #[tokio::test]
    async fn test_dispose() {
        let (bus, mut sub) = setup().await;
        send(&bus, "A", 1).await;
        wait_received(&sub, 1).await;

        sub.dispose().await.unwrap();
        assert_eq!(sub.state(), SubscriptionState::Disposed);
        assert!(!sub.has_pending());
        assert!(matches!(sub.poll(), Err(Error::Closed)));
        assert!(matches!(sub.dequeue().await, Err(Error::Closed)));
        assert_eq!(bus.queue_count(EXCHANGE).await, 0);

        // Second dispose is a no-op
        sub.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_requires_exchange() {
        let bus = LocalBus::new();
        let result =
            BodySubscription::bind(bus, "missing", "*.body", &QueueOptions::default()).await;
        assert!(result.is_err());
    }
}
