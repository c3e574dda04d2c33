//! Real-time distribution of skeletal tracking frames over a topic broker
//!
//! A sensor hands each frame of tracked bodies to a [`FrameDistributor`],
//! which flags ambiguous bodies, bundles them with the sensor id into a
//! [`FrameBag`] and publishes the bag under `{sender_id}.body`. Gesture
//! frames travel the same way under `{sender_id}.gesture`.
//!
//! Consumers bind a [`LastValueSubscription`]. It keeps only the freshest
//! undelivered bag, so a slow consumer always reads the current state
//! instead of working through a backlog.
//!
//! ```text
//!   sensor ──FrameSink──▶ FrameDistributor ──▶ bus ──▶ LastValueSubscription
//!                          (evaluators)        (topic exchange, per-queue TTL)
//! ```
//!
//! The in-process [`LocalBus`] needs no broker. Enable the `amqp` feature
//! for a RabbitMQ adapter.

pub mod bag;
pub mod body;
pub mod codec;
pub mod config;
pub mod distributor;
pub mod error;
pub mod processor;
pub mod publisher;
pub mod sensor;
pub mod stats;
pub mod subscription;
pub mod transport;

pub use bag::{BodyBag, FrameBag, GestureBag};
pub use body::{AmbiguityFlags, BodyRecord, Gesture, Joint, JointType, TrackingState};
pub use config::{BrokerConfig, QueueOptions, SittingConfig};
pub use distributor::{FrameDistributor, FrameOutcome};
pub use error::{Error, Result};
pub use publisher::BagPublisher;
pub use sensor::{FrameSink, SensorFrame};
pub use subscription::{BodySubscription, GestureSubscription, LastValueSubscription, SubscriptionState};
#[cfg(feature = "amqp")]
pub use transport::AmqpBus;
pub use transport::{LocalBus, MessageBus};
