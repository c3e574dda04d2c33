//! Counters for the distribution pipeline

pub mod metrics;

pub(crate) use metrics::PublisherCounters;
pub use metrics::{PublisherStats, SubscriptionStats};
