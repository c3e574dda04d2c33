//! Frame distribution
//!
//! The distributor sits between the sensor and the bus. For each body frame
//! it decides whether to transmit, runs the processor chain over the bodies
//! and publishes the bag:
//!
//! - disabled: nothing happens
//! - empty frame after an empty transmitted frame: nothing happens
//! - otherwise: process, bag, publish
//!
//! so a tracked-to-untracked transition produces exactly one empty bag and
//! consumers can tell that nobody is tracked anymore.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bag::{BodyBag, GestureBag};
use crate::body::{BodyRecord, Gesture};
use crate::config::SittingConfig;
use crate::error::Result;
use crate::processor::{
    process_bodies, AmbiguityEvaluator, BodyProcessor, Flagging, MissingArmEvaluator,
    SittingEvaluator,
};
use crate::publisher::BagPublisher;
use crate::sensor::SensorFrame;
use crate::stats::PublisherStats;
use crate::transport::{MessageBus, BODY_TOPIC, GESTURE_TOPIC};

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Distribution is switched off
    Disabled,
    /// Empty frame following an empty transmitted frame
    SkippedEmpty,
    /// Bag published
    Published { items: usize, bytes: usize },
}

/// Runs the processor chain and publishes frames for one sensor
pub struct FrameDistributor<B: MessageBus> {
    publisher: BagPublisher<B>,
    processors: Vec<Box<dyn BodyProcessor>>,
    enabled: Arc<AtomicBool>,
    last_body_count: usize,
}

impl<B: MessageBus> FrameDistributor<B> {
    /// Create a distributor with an empty processor chain
    pub fn new(publisher: BagPublisher<B>) -> Self {
        Self {
            publisher,
            processors: Vec::new(),
            enabled: Arc::new(AtomicBool::new(true)),
            last_body_count: 0,
        }
    }

    /// Create a distributor flagging missing arms and sitting bodies
    pub fn with_default_evaluators(publisher: BagPublisher<B>, sitting: &SittingConfig) -> Self {
        let mut distributor = Self::new(publisher);
        distributor.add_evaluator(MissingArmEvaluator::left());
        distributor.add_evaluator(MissingArmEvaluator::right());
        distributor.add_evaluator(SittingEvaluator::from_config(sitting));
        distributor
    }

    /// Append a processor to the chain
    pub fn add_processor(&mut self, processor: impl BodyProcessor + 'static) -> &mut Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Append an evaluator, setting its flag on matching bodies
    pub fn add_evaluator<E: AmbiguityEvaluator + 'static>(&mut self, evaluator: E) -> &mut Self {
        self.add_processor(Flagging(evaluator))
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(enabled = enabled, "Distribution switched");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Shared switch, for toggling while [`run`](Self::run) owns the distributor
    pub fn enabled_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    /// Handle one body frame
    ///
    /// Transport failures are returned; the last transmitted body count is
    /// only updated on success, so a failed empty frame is retried on the
    /// next empty frame.
    pub async fn on_frame_ready(
        &mut self,
        sensor_id: &str,
        mut bodies: Vec<BodyRecord>,
    ) -> Result<FrameOutcome> {
        let counters = self.publisher.counters();
        counters.record_received();

        if !self.is_enabled() {
            counters.record_skipped();
            return Ok(FrameOutcome::Disabled);
        }
        if bodies.is_empty() && self.last_body_count == 0 {
            counters.record_skipped();
            tracing::trace!(sensor = %sensor_id, "Skipped repeated empty frame");
            return Ok(FrameOutcome::SkippedEmpty);
        }

        let flagged = process_bodies(&self.processors, &mut bodies);
        let items = bodies.len();
        let bag = BodyBag::new(sensor_id, bodies);
        let bytes = self.publisher.publish_bag(BODY_TOPIC, &bag).await?;

        if items == 0 {
            tracing::debug!(sensor = %sensor_id, "Tracking lost, empty bag sent");
        } else if flagged > 0 {
            tracing::trace!(sensor = %sensor_id, bodies = items, flagged = flagged, "Ambiguous bodies");
        }
        self.last_body_count = items;
        Ok(FrameOutcome::Published { items, bytes })
    }

    /// Handle one gesture frame
    ///
    /// Gestures bypass the body chain, and frames without gestures are not
    /// sent.
    pub async fn on_gesture_frame(
        &mut self,
        sensor_id: &str,
        gestures: Vec<Gesture>,
    ) -> Result<FrameOutcome> {
        let counters = self.publisher.counters();
        counters.record_received();

        if !self.is_enabled() {
            counters.record_skipped();
            return Ok(FrameOutcome::Disabled);
        }
        if gestures.is_empty() {
            counters.record_skipped();
            return Ok(FrameOutcome::SkippedEmpty);
        }

        let items = gestures.len();
        let bag = GestureBag::new(sensor_id, gestures);
        let bytes = self.publisher.publish_bag(GESTURE_TOPIC, &bag).await?;
        Ok(FrameOutcome::Published { items, bytes })
    }

    /// Distribute frames until every [`FrameSink`](crate::sensor::FrameSink)
    /// is dropped
    pub async fn run(&mut self, mut frames: mpsc::Receiver<SensorFrame>) -> Result<()> {
        tracing::info!(sender = %self.publisher.sender_id(), "Distributor started");
        self.frame_loop(&mut frames).await;
        tracing::info!(sender = %self.publisher.sender_id(), "Frame source closed, distributor stopped");
        Ok(())
    }

    /// Distribute frames until `shutdown` resolves or the source closes
    pub async fn run_until<F>(&mut self, mut frames: mpsc::Receiver<SensorFrame>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(sender = %self.publisher.sender_id(), "Distributor started");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.frame_loop(&mut frames) => {
                tracing::info!("Frame source closed");
            }
        }

        let stats = self.stats();
        tracing::info!(
            published = stats.frames_published,
            skipped = stats.frames_skipped,
            errors = stats.publish_errors,
            "Distributor stopped"
        );
        Ok(())
    }

    async fn frame_loop(&mut self, frames: &mut mpsc::Receiver<SensorFrame>) {
        while let Some(frame) = frames.recv().await {
            let result = match frame {
                SensorFrame::Bodies { sensor_id, bodies } => {
                    self.on_frame_ready(&sensor_id, bodies).await
                }
                SensorFrame::Gestures {
                    sensor_id,
                    gestures,
                } => self.on_gesture_frame(&sensor_id, gestures).await,
            };

            // A lost frame is expected; the next one carries fresh state
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to publish frame");
            }
        }
    }

    pub fn publisher(&self) -> &BagPublisher<B> {
        &self.publisher
    }

    pub fn stats(&self) -> PublisherStats {
        self.publisher.stats()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::time::timeout;

    use super::*;
    use crate::body::{AmbiguityFlags, JointType, TrackingState};
    use crate::config::QueueOptions;
    use crate::error::TransportError;
    use crate::sensor::FrameSink;
    use crate::subscription::{BodySubscription, GestureSubscription};
    use crate::transport::{LocalBus, MailboxWriter};

    const EXCHANGE: &str = "kinect";

    async fn distributor() -> (LocalBus, FrameDistributor<LocalBus>) {
        let bus = LocalBus::new();
        let publisher = BagPublisher::new(bus.clone(), EXCHANGE, "lab").unwrap();
        publisher.declare().await.unwrap();
        (bus, FrameDistributor::new(publisher))
    }

    fn bodies(n: u64) -> Vec<BodyRecord> {
        (0..n).map(|id| BodyRecord::with_skeleton("sensor-1", id)).collect()
    }

    #[tokio::test]
    async fn test_empty_frame_transition() {
        let (_bus, mut distributor) = distributor().await;

        // Nothing tracked yet: nothing sent
        assert_eq!(
            distributor.on_frame_ready("sensor-1", Vec::new()).await.unwrap(),
            FrameOutcome::SkippedEmpty
        );

        let outcome = distributor.on_frame_ready("sensor-1", bodies(1)).await.unwrap();
        assert!(matches!(outcome, FrameOutcome::Published { items: 1, .. }));

        // Tracking lost: exactly one empty bag
        let outcome = distributor.on_frame_ready("sensor-1", Vec::new()).await.unwrap();
        assert!(matches!(outcome, FrameOutcome::Published { items: 0, .. }));
        assert_eq!(
            distributor.on_frame_ready("sensor-1", Vec::new()).await.unwrap(),
            FrameOutcome::SkippedEmpty
        );

        let stats = distributor.stats();
        assert_eq!(stats.frames_received, 4);
        assert_eq!(stats.frames_published, 2);
        assert_eq!(stats.empty_frames_published, 1);
        assert_eq!(stats.frames_skipped, 2);
    }

    #[tokio::test]
    async fn test_disabled_does_nothing() {
        let (_bus, mut distributor) = distributor().await;
        distributor.set_enabled(false);
        assert!(!distributor.is_enabled());

        assert_eq!(
            distributor.on_frame_ready("sensor-1", bodies(2)).await.unwrap(),
            FrameOutcome::Disabled
        );
        assert_eq!(distributor.stats().frames_published, 0);

        distributor.enabled_switch().store(true, Ordering::Relaxed);
        assert!(matches!(
            distributor.on_frame_ready("sensor-1", bodies(2)).await.unwrap(),
            FrameOutcome::Published { items: 2, .. }
        ));
    }

    /// Bus whose publishes fail while `fail` is set
    #[derive(Clone, Default)]
    struct FlakyBus {
        fail: Arc<AtomicBool>,
    }

    impl MessageBus for FlakyBus {
        type Binding = ();

        async fn declare_exchange(&self, _exchange: &str) -> Result<()> {
            Ok(())
        }

        async fn publish(&self, _exchange: &str, _routing_key: &str, _payload: Bytes) -> Result<()> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(TransportError::Broker("connection reset".into()).into());
            }
            Ok(())
        }

        async fn bind_queue(
            &self,
            _exchange: &str,
            _binding_key: &str,
            _options: &QueueOptions,
            _sink: MailboxWriter,
        ) -> Result<()> {
            Ok(())
        }

        async fn unbind(&self, _binding: ()) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_publish_keeps_last_count() {
        let bus = FlakyBus::default();
        let publisher = BagPublisher::new(bus.clone(), EXCHANGE, "lab").unwrap();
        let mut distributor = FrameDistributor::new(publisher);

        bus.fail.store(true, Ordering::Relaxed);
        assert!(distributor.on_frame_ready("sensor-1", bodies(1)).await.is_err());
        assert_eq!(distributor.last_body_count, 0);

        bus.fail.store(false, Ordering::Relaxed);
        distributor.on_frame_ready("sensor-1", bodies(1)).await.unwrap();
        assert_eq!(distributor.last_body_count, 1);

        // The empty transition frame fails, so it is attempted again
        bus.fail.store(true, Ordering::Relaxed);
        assert!(distributor.on_frame_ready("sensor-1", Vec::new()).await.is_err());
        bus.fail.store(false, Ordering::Relaxed);
        assert!(matches!(
            distributor.on_frame_ready("sensor-1", Vec::new()).await.unwrap(),
            FrameOutcome::Published { items: 0, .. }
        ));
        assert_eq!(
            distributor.on_frame_ready("sensor-1", Vec::new()).await.unwrap(),
            FrameOutcome::SkippedEmpty
        );
        assert_eq!(distributor.stats().publish_errors, 2);
    }

    #[tokio::test]
    async fn test_run_survives_publish_errors() {
        let bus = FlakyBus::default();
        bus.fail.store(true, Ordering::Relaxed);
        let mut distributor = FrameDistributor::new(BagPublisher::new(bus, EXCHANGE, "lab").unwrap());

        let (sink, frames) = FrameSink::channel("sensor-1", 8);
        assert!(sink.on_body_frame(bodies(1)));
        assert!(sink.on_body_frame(bodies(2)));
        drop(sink);

        distributor.run(frames).await.unwrap();
        let stats = distributor.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.publish_errors, 2);
    }

    #[tokio::test]
    async fn test_gesture_frames() {
        let (_bus, mut distributor) = distributor().await;
        assert_eq!(
            distributor.on_gesture_frame("sensor-1", Vec::new()).await.unwrap(),
            FrameOutcome::SkippedEmpty
        );
        let outcome = distributor
            .on_gesture_frame("sensor-1", vec![Gesture::continuous("Lean", 1, 0.4)])
            .await
            .unwrap();
        assert!(matches!(outcome, FrameOutcome::Published { items: 1, .. }));
    }

    #[tokio::test]
    async fn test_end_to_end_flags_and_routing() {
        let bus = LocalBus::new();
        let mut distributor = FrameDistributor::with_default_evaluators(
            BagPublisher::new(bus.clone(), EXCHANGE, "lab").unwrap(),
            &SittingConfig::default(),
        );
        distributor.publisher().declare().await.unwrap();
        assert_eq!(distributor.processor_count(), 3);

        let options = QueueOptions::default().no_ttl();
        let body_sub = BodySubscription::bind(bus.clone(), EXCHANGE, "*.body", &options)
            .await
            .unwrap();
        let gesture_sub = GestureSubscription::bind(bus.clone(), EXCHANGE, "lab.gesture", &options)
            .await
            .unwrap();

        let (sink, frames) = FrameSink::channel("sensor-1", 8);
        let mut body = sink.body(5);
        for joint_type in [
            JointType::ElbowRight,
            JointType::WristRight,
            JointType::HandRight,
            JointType::HandTipRight,
        ] {
            if let Some(joint) = body.joint_mut(joint_type) {
                joint.tracking_state = TrackingState::Inferred;
            }
        }
        assert!(sink.on_body_frame(vec![body]));
        assert!(sink.on_gesture_frame(vec![Gesture::discrete("Wave", 5, 0.9)]));
        drop(sink);

        distributor.run(frames).await.unwrap();

        let bag = timeout(Duration::from_secs(1), body_sub.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bag.sensor_id, "sensor-1");
        assert_eq!(bag.items[0].id, "sensor-1.5");
        assert!(bag.items[0].ambiguity.contains(AmbiguityFlags::MISSING_RIGHT_ARM));
        assert!(!bag.items[0].ambiguity.contains(AmbiguityFlags::MISSING_LEFT_ARM));

        let gestures = timeout(Duration::from_secs(1), gesture_sub.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gestures.items[0].name, "Wave");
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (_bus, mut distributor) = distributor().await;
        let (sink, frames) = FrameSink::channel("sensor-1", 8);
        assert!(sink.on_body_frame(bodies(1)));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        stop_tx.send(()).unwrap();
        distributor
            .run_until(frames, async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();

        // Sink outlives the distributor; later frames are refused
        assert!(!sink.on_body_frame(bodies(1)));
    }
}
