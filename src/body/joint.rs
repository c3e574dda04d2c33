//! Joint and vector types
//!
//! Joint type ordinals match the sensor SDK, so a dense joint array can be
//! indexed directly by `JointType as usize`.

use std::fmt;
use std::ops::{Add, Sub};

/// Number of canonical skeletal joints
pub const JOINT_COUNT: usize = 25;

/// Canonical skeletal joint identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum JointType {
    SpineBase = 0,
    SpineMid = 1,
    Neck = 2,
    Head = 3,
    ShoulderLeft = 4,
    ElbowLeft = 5,
    WristLeft = 6,
    HandLeft = 7,
    ShoulderRight = 8,
    ElbowRight = 9,
    WristRight = 10,
    HandRight = 11,
    HipLeft = 12,
    KneeLeft = 13,
    AnkleLeft = 14,
    FootLeft = 15,
    HipRight = 16,
    KneeRight = 17,
    AnkleRight = 18,
    FootRight = 19,
    SpineShoulder = 20,
    HandTipLeft = 21,
    ThumbLeft = 22,
    HandTipRight = 23,
    ThumbRight = 24,
}

impl JointType {
    /// All joint types in ordinal order
    pub const ALL: [JointType; JOINT_COUNT] = [
        JointType::SpineBase,
        JointType::SpineMid,
        JointType::Neck,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
        JointType::SpineShoulder,
        JointType::HandTipLeft,
        JointType::ThumbLeft,
        JointType::HandTipRight,
        JointType::ThumbRight,
    ];

    /// Ordinal used as the dense array index and on the wire
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a joint type by ordinal
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Tracking state of a joint (or of the lean vector)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TrackingState {
    #[default]
    NotTracked = 0,
    Inferred = 1,
    Tracked = 2,
}

impl TrackingState {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(TrackingState::NotTracked),
            1 => Some(TrackingState::Inferred),
            2 => Some(TrackingState::Tracked),
            _ => None,
        }
    }
}

/// 3D vector in sensor space (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn sqr_magnitude(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn magnitude(&self) -> f32 {
        self.sqr_magnitude().sqrt()
    }

    /// Euclidean distance between two points
    pub fn distance(a: Vector3, b: Vector3) -> f32 {
        (a - b).magnitude()
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Orientation quaternion
///
/// `Default` is all zeros (the wire default); use [`Vector4::IDENTITY`]
/// for a neutral rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vector4 {
    pub const IDENTITY: Vector4 = Vector4::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

/// 2D point, used for the lean amount (x = left/right, y = forward/back)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One skeletal joint for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub joint_type: JointType,
    pub position: Vector3,
    pub orientation: Vector4,
    pub tracking_state: TrackingState,
}

impl Joint {
    /// Create a joint at a position with identity orientation
    pub fn new(joint_type: JointType, position: Vector3, tracking_state: TrackingState) -> Self {
        Self {
            joint_type,
            position,
            orientation: Vector4::IDENTITY,
            tracking_state,
        }
    }

    /// A not-tracked joint at the origin
    pub fn untracked(joint_type: JointType) -> Self {
        Self::new(joint_type, Vector3::ZERO, TrackingState::NotTracked)
    }

    /// Set the orientation
    pub fn with_orientation(mut self, orientation: Vector4) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn is_inferred(&self) -> bool {
        self.tracking_state == TrackingState::Inferred
    }
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            joint_type: JointType::SpineBase,
            position: Vector3::ZERO,
            orientation: Vector4::default(),
            tracking_state: TrackingState::NotTracked,
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Joint {:?} {:?} {}",
            self.joint_type, self.tracking_state, self.position
        )
    }
}
