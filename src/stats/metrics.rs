//! Statistics for publishers and subscriptions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::transport::MailboxCounters;

/// Publisher-side statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublisherStats {
    /// Frames handed to the distributor
    pub frames_received: u64,
    /// Bags published (including empty ones)
    pub frames_published: u64,
    /// Empty bags published to signal "nothing tracked anymore"
    pub empty_frames_published: u64,
    /// Frames skipped (disabled, or empty after an empty frame)
    pub frames_skipped: u64,
    /// Total payload bytes handed to the bus
    pub bytes_sent: u64,
    /// Publishes the bus rejected
    pub publish_errors: u64,
    /// Time since the publisher was created
    pub uptime: Duration,
}

impl PublisherStats {
    /// Average encoded bag size
    pub fn bytes_per_frame(&self) -> u64 {
        if self.frames_published > 0 {
            self.bytes_sent / self.frames_published
        } else {
            0
        }
    }

    /// Published frames per second over the publisher's lifetime
    pub fn publish_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_published as f64 / secs
        } else {
            0.0
        }
    }
}

/// Subscription-side statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionStats {
    /// Messages written into the slot
    pub received: u64,
    /// Messages replaced by a newer one before being read
    pub overwritten: u64,
    /// Messages dropped for exceeding the queue TTL
    pub expired: u64,
    /// Bags decoded and returned to the consumer
    pub delivered: u64,
    /// Messages that failed to decode
    pub decode_errors: u64,
}

impl SubscriptionStats {
    pub(crate) fn new(counters: MailboxCounters, delivered: u64, decode_errors: u64) -> Self {
        Self {
            received: counters.received,
            overwritten: counters.overwritten,
            expired: counters.expired,
            delivered,
            decode_errors,
        }
    }

    /// Messages the consumer never saw
    pub fn dropped(&self) -> u64 {
        self.overwritten + self.expired
    }
}

/// Live publisher counters, read through [`PublisherCounters::snapshot`]
#[derive(Debug)]
pub(crate) struct PublisherCounters {
    started_at: Instant,
    frames_received: AtomicU64,
    frames_published: AtomicU64,
    empty_frames_published: AtomicU64,
    frames_skipped: AtomicU64,
    bytes_sent: AtomicU64,
    publish_errors: AtomicU64,
}

impl PublisherCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_received: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            empty_frames_published: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            publish_errors: AtomicU64::new(0),
        }
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self, bytes: usize, empty: bool) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        if empty {
            self.empty_frames_published.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            empty_frames_published: self.empty_frames_published.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_counters() {
        let counters = PublisherCounters::new();
        counters.record_received();
        counters.record_received();
        counters.record_published(120, false);
        counters.record_published(10, true);
        counters.record_skipped();
        counters.record_error();

        let stats = counters.snapshot();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_published, 2);
        assert_eq!(stats.empty_frames_published, 1);
        assert_eq!(stats.frames_skipped, 1);
        assert_eq!(stats.bytes_sent, 130);
        assert_eq!(stats.publish_errors, 1);
        assert_eq!(stats.bytes_per_frame(), 65);
    }

    #[test]
    fn test_rates_with_nothing_published() {
        let stats = PublisherStats::default();
        assert_eq!(stats.bytes_per_frame(), 0);
        assert_eq!(stats.publish_rate(), 0.0);
    }

    #[test]
    fn test_publish_rate() {
        let stats = PublisherStats {
            frames_published: 300,
            uptime: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(stats.publish_rate(), 30.0);
    }

    #[test]
    fn test_subscription_dropped() {
        let counters = MailboxCounters {
            received: 10,
            overwritten: 6,
            expired: 3,
        };
        let stats = SubscriptionStats::new(counters, 4, 0);
        assert_eq!(stats.dropped(), 9);
        assert_eq!(stats.delivered, 4);
    }
}
