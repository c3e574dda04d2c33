//! Skeleton hierarchy and mirroring tables
//!
//! Both tables are indexed by joint ordinal.

use super::joint::{JointType, JOINT_COUNT};

use JointType::*;

/// Parent of each joint in the skeleton hierarchy. The root maps to itself.
const PARENTS: [JointType; JOINT_COUNT] = [
    SpineBase,     // SpineBase
    SpineBase,     // SpineMid
    SpineShoulder, // Neck
    Neck,          // Head
    SpineShoulder, // ShoulderLeft
    ShoulderLeft,  // ElbowLeft
    ElbowLeft,     // WristLeft
    WristLeft,     // HandLeft
    SpineShoulder, // ShoulderRight
    ShoulderRight, // ElbowRight
    ElbowRight,    // WristRight
    WristRight,    // HandRight
    SpineBase,     // HipLeft
    HipLeft,       // KneeLeft
    KneeLeft,      // AnkleLeft
    AnkleLeft,     // FootLeft
    SpineBase,     // HipRight
    HipRight,      // KneeRight
    KneeRight,     // AnkleRight
    AnkleRight,    // FootRight
    SpineMid,      // SpineShoulder
    HandLeft,      // HandTipLeft
    WristLeft,     // ThumbLeft
    HandRight,     // HandTipRight
    WristRight,    // ThumbRight
];

/// Left/right counterpart of each joint. Joints on the center line map to themselves.
const MIRRORS: [JointType; JOINT_COUNT] = [
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    SpineShoulder,
    HandTipRight,
    ThumbRight,
    HandTipLeft,
    ThumbLeft,
];

impl JointType {
    /// Parent joint, or `None` for the root (`SpineBase`)
    pub fn parent(self) -> Option<JointType> {
        let parent = PARENTS[self.index()];
        (parent != self).then_some(parent)
    }

    /// Mirrored counterpart (e.g. `HandLeft` for `HandRight`)
    pub fn mirrored(self) -> JointType {
        MIRRORS[self.index()]
    }

    /// Whether the joint has a distinct left/right counterpart
    pub fn is_mirrorable(self) -> bool {
        self.mirrored() != self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_has_no_parent() {
        assert_eq!(SpineBase.parent(), None);
        assert_eq!(Head.parent(), Some(Neck));
        assert_eq!(ThumbRight.parent(), Some(WristRight));
    }

    #[test]
    fn test_every_joint_reaches_root() {
        for joint in JointType::ALL {
            let mut current = joint;
            let mut steps = 0;
            while let Some(parent) = current.parent() {
                current = parent;
                steps += 1;
                assert!(steps < JOINT_COUNT, "cycle from {:?}", joint);
            }
            assert_eq!(current, SpineBase);
        }
    }

    #[test]
    fn test_mirror_is_involution() {
        for joint in JointType::ALL {
            assert_eq!(joint.mirrored().mirrored(), joint);
        }
        assert_eq!(HandTipLeft.mirrored(), HandTipRight);
        assert!(KneeLeft.is_mirrorable());
        assert!(!SpineShoulder.is_mirrorable());
    }

    #[test]
    fn test_mirrored_parent_is_parent_mirrored() {
        for joint in JointType::ALL {
            assert_eq!(
                joint.mirrored().parent(),
                joint.parent().map(JointType::mirrored)
            );
        }
    }
}
