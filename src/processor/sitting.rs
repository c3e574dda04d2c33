//! Sitting heuristic
//!
//! Sitting brings the knees up to roughly hip height, so the knees' and
//! hips' heights relative to the head become nearly equal. Heights are
//! shifted by the sensor height so they are measured from the floor.

use crate::body::{AmbiguityFlags, BodyRecord, JointType};
use crate::config::SittingConfig;

use super::AmbiguityEvaluator;

#[derive(Debug, Clone, Copy)]
pub struct SittingEvaluator {
    sensor_height: f32,
    min_proportion: f32,
}

impl SittingEvaluator {
    pub fn new(sensor_height: f32, min_proportion: f32) -> Self {
        Self {
            sensor_height,
            min_proportion,
        }
    }

    pub fn from_config(config: &SittingConfig) -> Self {
        Self::new(config.sensor_height, config.min_proportion)
    }
}

impl Default for SittingEvaluator {
    fn default() -> Self {
        Self::from_config(&SittingConfig::default())
    }
}

impl AmbiguityEvaluator for SittingEvaluator {
    fn flag(&self) -> AmbiguityFlags {
        AmbiguityFlags::SITTING
    }

    fn should_flag(&self, body: &BodyRecord) -> bool {
        let height = |t: JointType| body.joint(t).map(|j| j.position.y);
        let (Some(head), Some(hip_left), Some(hip_right), Some(knee_left), Some(knee_right)) = (
            height(JointType::Head),
            height(JointType::HipLeft),
            height(JointType::HipRight),
            height(JointType::KneeLeft),
            height(JointType::KneeRight),
        ) else {
            return false;
        };

        let h = self.sensor_height;
        let head_height = head + h;
        let hip_ratio = (hip_left + hip_right + 2.0 * h) / (2.0 * head_height);
        let knee_left_ratio = (knee_left + h) / head_height;
        let knee_right_ratio = (knee_right + h) / head_height;

        (knee_left_ratio - hip_ratio).abs() < self.min_proportion
            && (knee_right_ratio - hip_ratio).abs() < self.min_proportion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Joint, TrackingState, Vector3};

    fn pose(knee_y: f32) -> BodyRecord {
        let mut body = BodyRecord::new("s", 1);
        let tracked = |t, x, y| Joint::new(t, Vector3::new(x, y, 0.0), TrackingState::Tracked);
        body.set_joint(tracked(JointType::Head, 0.0, 2.0));
        body.set_joint(tracked(JointType::HipLeft, -0.2, 1.0));
        body.set_joint(tracked(JointType::HipRight, 0.2, 1.0));
        body.set_joint(tracked(JointType::KneeLeft, -0.2, knee_y));
        body.set_joint(tracked(JointType::KneeRight, 0.2, knee_y));
        body
    }

    #[test]
    fn test_standing_is_not_sitting() {
        let evaluator = SittingEvaluator::new(0.0, 0.1);
        assert!(!evaluator.should_flag(&pose(0.5)));
    }

    #[test]
    fn test_knees_at_hip_height_is_sitting() {
        let evaluator = SittingEvaluator::new(0.0, 0.1);
        assert!(evaluator.should_flag(&pose(1.0)));
        assert_eq!(evaluator.flag(), AmbiguityFlags::SITTING);
    }

    #[test]
    fn test_missing_joint_cannot_judge() {
        let evaluator = SittingEvaluator::new(0.0, 0.1);
        let mut body = pose(1.0);
        body.joints.retain(|j| j.joint_type != JointType::KneeRight);
        assert!(!evaluator.should_flag(&body));
    }

    #[test]
    fn test_sensor_height_shifts_ratios() {
        // Sensor-relative heights: with the sensor 2m up the standing pose
        // is head 4, hips 3, knees 2.5 from the floor. Ratios 0.75 vs 0.625.
        let evaluator = SittingEvaluator::default();
        assert!(!evaluator.should_flag(&pose(0.5)));

        // Knees 0.7 -> 2.7/4 = 0.675, within 0.1 of 0.75
        assert!(evaluator.should_flag(&pose(0.7)));
    }

    #[test]
    fn test_from_config() {
        let evaluator = SittingEvaluator::from_config(&SittingConfig::new(0.0, 0.3));
        // Knee ratio 0.25 vs hip ratio 0.5, inside a 0.3 tolerance
        assert!(evaluator.should_flag(&pose(0.5)));
    }
}
