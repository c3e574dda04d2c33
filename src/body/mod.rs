//! Skeletal data model
//!
//! Joints, bodies and gestures as produced by the frame source and carried
//! inside a [`FrameBag`](crate::bag::FrameBag).

pub mod gesture;
pub mod joint;
pub mod record;
pub mod skeleton;

pub use gesture::Gesture;
pub use joint::{Joint, JointType, Point2, TrackingState, Vector3, Vector4, JOINT_COUNT};
pub use record::{AmbiguityFlags, BodyRecord, HandState};
