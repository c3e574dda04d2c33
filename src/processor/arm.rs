//! Missing-arm heuristic

use crate::body::{AmbiguityFlags, BodyRecord, JointType};

use super::AmbiguityEvaluator;

/// Inferred joints (out of five) at which an arm counts as missing
pub const INFERRED_THRESHOLD: usize = 4;

const LEFT_ARM: [JointType; 5] = [
    JointType::ElbowLeft,
    JointType::WristLeft,
    JointType::HandLeft,
    JointType::HandTipLeft,
    JointType::ThumbLeft,
];

const RIGHT_ARM: [JointType; 5] = [
    JointType::ElbowRight,
    JointType::WristRight,
    JointType::HandRight,
    JointType::HandTipRight,
    JointType::ThumbRight,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmSide {
    Left,
    Right,
}

/// Flags an arm whose joints are mostly inferred rather than seen
///
/// A single occluded joint is common and harmless, so the arm is only
/// flagged when at least [`INFERRED_THRESHOLD`] of elbow, wrist, hand,
/// hand tip and thumb are inferred.
#[derive(Debug, Clone, Copy)]
pub struct MissingArmEvaluator {
    side: ArmSide,
}

impl MissingArmEvaluator {
    pub fn left() -> Self {
        Self { side: ArmSide::Left }
    }

    pub fn right() -> Self {
        Self { side: ArmSide::Right }
    }

    pub fn side(&self) -> ArmSide {
        self.side
    }

    fn joints(&self) -> &'static [JointType; 5] {
        match self.side {
            ArmSide::Left => &LEFT_ARM,
            ArmSide::Right => &RIGHT_ARM,
        }
    }

    /// Number of the arm's joints currently inferred
    pub fn inferred_count(&self, body: &BodyRecord) -> usize {
        self.joints()
            .iter()
            .filter(|t| body.is_joint_inferred(**t))
            .count()
    }
}

impl AmbiguityEvaluator for MissingArmEvaluator {
    fn flag(&self) -> AmbiguityFlags {
        match self.side {
            ArmSide::Left => AmbiguityFlags::MISSING_LEFT_ARM,
            ArmSide::Right => AmbiguityFlags::MISSING_RIGHT_ARM,
        }
    }

    fn should_flag(&self, body: &BodyRecord) -> bool {
        self.inferred_count(body) >= INFERRED_THRESHOLD
    }
}
