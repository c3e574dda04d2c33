//! Gesture results
//!
//! Discrete and continuous gestures share one type. Only detected
//! gestures are ever sent, so there is no "detected" field.

use std::fmt;

/// One gesture result for one tracked body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gesture {
    pub name: String,
    /// Hardware tracking id of the body performing the gesture
    pub tracking_id: u64,
    pub is_continuous: bool,
    /// Confidence for discrete gestures, progress for continuous ones
    pub value: f32,
}

impl Gesture {
    pub fn discrete(name: impl Into<String>, tracking_id: u64, confidence: f32) -> Self {
        Self {
            name: name.into(),
            tracking_id,
            is_continuous: false,
            value: confidence,
        }
    }

    pub fn continuous(name: impl Into<String>, tracking_id: u64, progress: f32) -> Self {
        Self {
            name: name.into(),
            tracking_id,
            is_continuous: true,
            value: progress,
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gesture {} for {}: {} ({})",
            self.name,
            self.tracking_id,
            self.value,
            if self.is_continuous { "Continuous" } else { "Discrete" }
        )
    }
}
