//! Frame source adapter
//!
//! The sensor driver calls into a [`FrameSink`] once per hardware frame at
//! whatever rate the hardware runs. The sink only hands frames over; it
//! never waits on the distributor, so a slow bus cannot stall the driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::body::{BodyRecord, Gesture};

/// Default number of frames buffered between driver and distributor
pub const DEFAULT_FRAME_QUEUE: usize = 4;

/// One frame from a sensor
#[derive(Debug, Clone, PartialEq)]
pub enum SensorFrame {
    /// Bodies currently tracked (possibly none)
    Bodies {
        sensor_id: String,
        bodies: Vec<BodyRecord>,
    },
    /// Gestures detected in this frame
    Gestures {
        sensor_id: String,
        gestures: Vec<Gesture>,
    },
}

impl SensorFrame {
    pub fn sensor_id(&self) -> &str {
        match self {
            SensorFrame::Bodies { sensor_id, .. } | SensorFrame::Gestures { sensor_id, .. } => {
                sensor_id
            }
        }
    }
}

/// Generate a sensor or sender id (hyphenated UUID v4)
pub fn generate_sensor_id() -> String {
    Uuid::new_v4().to_string()
}

/// Driver-facing end of the frame hand-off
///
/// Cloneable so body and gesture callbacks can each own one.
#[derive(Clone)]
pub struct FrameSink {
    sensor_id: String,
    tx: mpsc::Sender<SensorFrame>,
    rejected: Arc<AtomicU64>,
}

impl FrameSink {
    /// Create a sink and the receiver the distributor runs on
    pub fn channel(sensor_id: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<SensorFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            sensor_id: sensor_id.into(),
            tx,
            rejected: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// Create a sink with a generated sensor id
    pub fn with_generated_id(capacity: usize) -> (Self, mpsc::Receiver<SensorFrame>) {
        Self::channel(generate_sensor_id(), capacity)
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// New body record with an id unique across sensors
    pub fn body(&self, tracking_id: u64) -> BodyRecord {
        BodyRecord::with_skeleton(&self.sensor_id, tracking_id)
    }

    /// Hand over the bodies tracked in this frame
    ///
    /// Returns `false` if the frame was rejected (queue full or distributor
    /// gone).
    pub fn on_body_frame(&self, bodies: Vec<BodyRecord>) -> bool {
        self.offer(SensorFrame::Bodies {
            sensor_id: self.sensor_id.clone(),
            bodies,
        })
    }

    /// Hand over the gestures detected in this frame
    pub fn on_gesture_frame(&self, gestures: Vec<Gesture>) -> bool {
        self.offer(SensorFrame::Gestures {
            sensor_id: self.sensor_id.clone(),
            gestures,
        })
    }

    /// Frames rejected because the distributor fell behind
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn offer(&self, frame: SensorFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let rejected = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(sensor = %self.sensor_id, rejected = rejected, "Frame queue full, frame rejected");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(sensor = %self.sensor_id, "Distributor gone, frame dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_routable() {
        let id = generate_sensor_id();
        assert_eq!(id.len(), 36);
        assert!(!id.contains(['.', '*', '#']));
        assert_ne!(id, generate_sensor_id());
    }

    #[test]
    fn test_body_ids_include_sensor() {
        let (sink, _rx) = FrameSink::channel("sensor-1", 1);
        let body = sink.body(72057594037928000);
        assert_eq!(body.id, "sensor-1.72057594037928000");
        assert!(body.has_full_skeleton());
    }

    #[tokio::test]
    async fn test_frames_are_stamped() {
        let (sink, mut rx) = FrameSink::channel("sensor-1", 2);
        assert!(sink.on_body_frame(vec![sink.body(1)]));
        assert!(sink.on_gesture_frame(vec![Gesture::discrete("Wave", 1, 0.5)]));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.sensor_id(), "sensor-1");
        assert!(matches!(frame, SensorFrame::Bodies { ref bodies, .. } if bodies.len() == 1));
        assert!(matches!(rx.recv().await.unwrap(), SensorFrame::Gestures { .. }));
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let (sink, _rx) = FrameSink::channel("sensor-1", 1);
        assert!(sink.on_body_frame(Vec::new()));
        assert!(!sink.on_body_frame(Vec::new()));
        assert!(!sink.on_body_frame(Vec::new()));
        assert_eq!(sink.rejected(), 2);
    }

    #[test]
    fn test_closed_distributor() {
        let (sink, rx) = FrameSink::channel("sensor-1", 1);
        drop(rx);
        assert!(!sink.on_body_frame(Vec::new()));
        assert_eq!(sink.rejected(), 0);
    }
}
