//! Per-frame body record
//!
//! A [`BodyRecord`] is built fresh for every frame by the frame-source
//! adapter, passes once through the processor chain, and is dropped after
//! serialization.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::joint::{Joint, JointType, Point2, TrackingState, Vector3, JOINT_COUNT};

/// Set of independent ambiguity bits for one body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AmbiguityFlags(u32);

impl AmbiguityFlags {
    pub const CLEAR: AmbiguityFlags = AmbiguityFlags(0);
    pub const OBSCURED: AmbiguityFlags = AmbiguityFlags(1 << 0);
    pub const SITTING: AmbiguityFlags = AmbiguityFlags(1 << 1);
    pub const MISSING_LEFT_ARM: AmbiguityFlags = AmbiguityFlags(1 << 2);
    pub const MISSING_RIGHT_ARM: AmbiguityFlags = AmbiguityFlags(1 << 3);
    pub const SHADOW_OUT_OF_RANGE: AmbiguityFlags = AmbiguityFlags(1 << 4);
    pub const SHADOW_LOST: AmbiguityFlags = AmbiguityFlags(1 << 5);

    const NAMED: [(AmbiguityFlags, &'static str); 6] = [
        (Self::OBSCURED, "Obscured"),
        (Self::SITTING, "Sitting"),
        (Self::MISSING_LEFT_ARM, "MissingLeftArm"),
        (Self::MISSING_RIGHT_ARM, "MissingRightArm"),
        (Self::SHADOW_OUT_OF_RANGE, "ShadowOutOfRange"),
        (Self::SHADOW_LOST, "ShadowLost"),
    ];

    const KNOWN_BITS: u32 = 0b11_1111;

    /// Build from raw bits, keeping unknown bits so newer senders round-trip
    pub const fn from_bits(bits: u32) -> Self {
        AmbiguityFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_clear(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: AmbiguityFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: AmbiguityFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: AmbiguityFlags) {
        self.0 &= !other.0;
    }

    /// Whether any bit outside the named flags is set
    pub const fn has_unknown_bits(self) -> bool {
        self.0 & !Self::KNOWN_BITS != 0
    }
}

impl BitOr for AmbiguityFlags {
    type Output = AmbiguityFlags;

    fn bitor(self, rhs: AmbiguityFlags) -> AmbiguityFlags {
        AmbiguityFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AmbiguityFlags {
    fn bitor_assign(&mut self, rhs: AmbiguityFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for AmbiguityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clear() {
            return write!(f, "Clear");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if self.has_unknown_bits() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{:#x}", self.0 & !Self::KNOWN_BITS)?;
        }
        Ok(())
    }
}

/// Hand state reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum HandState {
    #[default]
    Unknown = 0,
    NotTracked = 1,
    Open = 2,
    Closed = 3,
    Lasso = 4,
}

impl HandState {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(HandState::Unknown),
            1 => Some(HandState::NotTracked),
            2 => Some(HandState::Open),
            3 => Some(HandState::Closed),
            4 => Some(HandState::Lasso),
            _ => None,
        }
    }
}

/// One tracked body for one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodyRecord {
    /// `{sensorId}.{trackingId}`, unique across sensors
    pub id: String,

    /// Joints, densely indexed by joint ordinal when complete
    pub joints: Vec<Joint>,

    /// Ambiguity bits set by the processor chain
    pub ambiguity: AmbiguityFlags,

    pub hand_left_state: HandState,
    pub hand_right_state: HandState,
    pub hand_left_confidence: f32,
    pub hand_right_confidence: f32,

    /// Application-assigned priority. Meaning belongs to the consumer.
    pub priority: i32,

    /// Lean amount (x = left/right, y = forward/back)
    pub lean: Point2,
    pub lean_tracking_state: TrackingState,

    /// Raw hardware tracking id
    pub tracking_id: u64,

    /// Scalar values derived by processors
    pub float_data: BTreeMap<String, f32>,

    /// Vector values derived by processors
    pub vector3_data: BTreeMap<String, Vector3>,
}

impl BodyRecord {
    /// Create a body with an id composed from the sensor and tracking ids
    pub fn new(sensor_id: &str, tracking_id: u64) -> Self {
        Self {
            id: Self::compose_id(sensor_id, tracking_id),
            tracking_id,
            ..Default::default()
        }
    }

    /// Create a body with a full, untracked skeleton
    pub fn with_skeleton(sensor_id: &str, tracking_id: u64) -> Self {
        let mut body = Self::new(sensor_id, tracking_id);
        body.joints = JointType::ALL.iter().map(|t| Joint::untracked(*t)).collect();
        body
    }

    /// Body ids combine sensor and hardware tracking ids; tracking ids
    /// alone are only unique per device.
    pub fn compose_id(sensor_id: &str, tracking_id: u64) -> String {
        format!("{}.{}", sensor_id, tracking_id)
    }

    /// Whether the joint array is dense and complete
    pub fn has_full_skeleton(&self) -> bool {
        self.joints.len() == JOINT_COUNT
            && self
                .joints
                .iter()
                .enumerate()
                .all(|(i, j)| j.joint_type.index() == i)
    }

    /// Look up a joint by type
    ///
    /// Uses the dense index when it matches, falls back to a scan for
    /// sparse or reordered arrays.
    pub fn joint(&self, joint_type: JointType) -> Option<&Joint> {
        match self.joints.get(joint_type.index()) {
            Some(joint) if joint.joint_type == joint_type => Some(joint),
            _ => self.joints.iter().find(|j| j.joint_type == joint_type),
        }
    }

    /// Mutable joint lookup, same rules as [`joint`](Self::joint)
    pub fn joint_mut(&mut self, joint_type: JointType) -> Option<&mut Joint> {
        let index = joint_type.index();
        if self.joints.get(index).map(|j| j.joint_type) == Some(joint_type) {
            return self.joints.get_mut(index);
        }
        self.joints.iter_mut().find(|j| j.joint_type == joint_type)
    }

    /// Replace (or add) the joint of the same type
    pub fn set_joint(&mut self, joint: Joint) {
        match self.joint_mut(joint.joint_type) {
            Some(slot) => *slot = joint,
            None => self.joints.push(joint),
        }
    }

    /// Whether the joint exists and is inferred
    pub fn is_joint_inferred(&self, joint_type: JointType) -> bool {
        self.joint(joint_type).is_some_and(Joint::is_inferred)
    }

    /// Translate every joint position
    pub fn apply_offset(&mut self, x: f32, y: f32, z: f32) {
        let offset = Vector3::new(x, y, z);
        for joint in &mut self.joints {
            joint.position = joint.position + offset;
        }
    }
}

impl fmt::Display for BodyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id: {} Ambiguity: {}", self.id, self.ambiguity)
    }
}
