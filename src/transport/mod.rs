//! Message bus abstraction
//!
//! A bus offers the slice of a topic broker this crate needs: declare a
//! topic exchange, publish a payload under a routing key, and bind a
//! short-lived queue whose deliveries are written into a last-value
//! [`mailbox`]. Two realisations exist: [`LocalBus`] (in-process) and,
//! with the `amqp` feature, [`AmqpBus`].

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod local;
pub mod mailbox;
pub mod topic;

use std::future::Future;

use bytes::Bytes;

use crate::config::QueueOptions;
use crate::error::Result;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpBinding, AmqpBus};
pub use local::{LocalBinding, LocalBus};
pub use mailbox::{mailbox, MailboxCounters, MailboxReader, MailboxWriter};
pub use topic::{RoutingKey, TopicPattern, BODY_TOPIC, GESTURE_TOPIC};

/// Client side of a topic broker
///
/// Publishing is fire-and-forget: implementations hand the payload to the
/// broker and return without waiting for delivery.
pub trait MessageBus: Clone + Send + Sync + 'static {
    /// Handle for one bound queue, released by [`unbind`](Self::unbind).
    /// Dropping it also tears the queue down.
    type Binding: Send + 'static;

    /// Declare a topic exchange (idempotent)
    fn declare_exchange(&self, exchange: &str) -> impl Future<Output = Result<()>> + Send;

    /// Publish one payload
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Declare a private queue, bind it with `binding_key` and route every
    /// delivery into `sink`
    fn bind_queue(
        &self,
        exchange: &str,
        binding_key: &str,
        options: &QueueOptions,
        sink: MailboxWriter,
    ) -> impl Future<Output = Result<Self::Binding>> + Send;

    /// Cancel delivery and delete the queue
    fn unbind(&self, binding: Self::Binding) -> impl Future<Output = Result<()>> + Send;
}
