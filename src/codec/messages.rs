//! Field layouts
//!
//! ```text
//! FrameBag    1 sensor_id (string)   2 items (repeated message)
//! BodyRecord  1 id                   2 joints (repeated Joint)
//!             3 ambiguity (bits)     4/5 hand left/right state
//!             6/7 hand confidences   8 priority (int32)
//!             9 lean (Point2)        10 lean tracking state
//!             11 tracking_id         12 float_data (map<string, float>)
//!             13 vector3_data (map<string, Vector3>)
//! Joint       1 position (Vector3)   2 tracking state
//!             3 joint type           4 orientation (Vector4)
//! Gesture     1 name                 2 tracking_id
//!             3 is_continuous        4 value
//! Vector3     1 x  2 y  3 z          Vector4  1 x  2 y  3 z  4 w
//! Point2      1 x  2 y
//! Map entry   1 key                  2 value
//! ```

use crate::bag::FrameBag;
use crate::body::{
    AmbiguityFlags, BodyRecord, Gesture, HandState, Joint, JointType, Point2, TrackingState,
    Vector3, Vector4,
};
use crate::error::CodecError;

use super::{WireDecoder, WireEncoder, WireMessage, WireType};

impl<T: WireMessage> WireMessage for FrameBag<T> {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.string(1, &self.sensor_id);
        enc.repeated(2, &self.items);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.sensor_id = dec.read_string(wire_type)?,
            2 => self.items.push(dec.read_message(wire_type)?),
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

impl WireMessage for BodyRecord {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.string(1, &self.id);
        enc.repeated(2, &self.joints);
        enc.uint64(3, self.ambiguity.bits() as u64);
        enc.uint64(4, self.hand_left_state as u64);
        enc.uint64(5, self.hand_right_state as u64);
        enc.float(6, self.hand_left_confidence);
        enc.float(7, self.hand_right_confidence);
        enc.int32(8, self.priority);
        enc.message(9, &self.lean);
        enc.uint64(10, self.lean_tracking_state as u64);
        enc.uint64(11, self.tracking_id);
        for (key, value) in &self.float_data {
            enc.message(12, &FloatEntry { key: key.clone(), value: *value });
        }
        for (key, value) in &self.vector3_data {
            enc.message(13, &Vector3Entry { key: key.clone(), value: *value });
        }
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.id = dec.read_string(wire_type)?,
            2 => self.joints.push(dec.read_message(wire_type)?),
            3 => {
                let value = dec.read_uint64(wire_type)?;
                let bits = u32::try_from(value).map_err(|_| CodecError::InvalidEnum {
                    field: "ambiguity",
                    value,
                })?;
                self.ambiguity = AmbiguityFlags::from_bits(bits);
            }
            4 => self.hand_left_state = hand_state(dec.read_uint64(wire_type)?, "hand_left_state")?,
            5 => self.hand_right_state = hand_state(dec.read_uint64(wire_type)?, "hand_right_state")?,
            6 => self.hand_left_confidence = dec.read_float(wire_type)?,
            7 => self.hand_right_confidence = dec.read_float(wire_type)?,
            8 => self.priority = dec.read_int32(wire_type)?,
            9 => self.lean = dec.read_message(wire_type)?,
            10 => {
                self.lean_tracking_state =
                    tracking_state(dec.read_uint64(wire_type)?, "lean_tracking_state")?
            }
            11 => self.tracking_id = dec.read_uint64(wire_type)?,
            12 => {
                let entry: FloatEntry = dec.read_message(wire_type)?;
                self.float_data.insert(entry.key, entry.value);
            }
            13 => {
                let entry: Vector3Entry = dec.read_message(wire_type)?;
                self.vector3_data.insert(entry.key, entry.value);
            }
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

impl WireMessage for Joint {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.message(1, &self.position);
        enc.uint64(2, self.tracking_state as u64);
        enc.uint64(3, self.joint_type as u64);
        enc.message(4, &self.orientation);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.position = dec.read_message(wire_type)?,
            2 => self.tracking_state = tracking_state(dec.read_uint64(wire_type)?, "tracking_state")?,
            3 => {
                let value = dec.read_uint64(wire_type)?;
                self.joint_type = usize::try_from(value)
                    .ok()
                    .and_then(JointType::from_index)
                    .ok_or(CodecError::InvalidEnum {
                        field: "joint_type",
                        value,
                    })?;
            }
            4 => self.orientation = dec.read_message(wire_type)?,
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

impl WireMessage for Gesture {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.string(1, &self.name);
        enc.uint64(2, self.tracking_id);
        enc.bool(3, self.is_continuous);
        enc.float(4, self.value);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.name = dec.read_string(wire_type)?,
            2 => self.tracking_id = dec.read_uint64(wire_type)?,
            3 => self.is_continuous = dec.read_bool(wire_type)?,
            4 => self.value = dec.read_float(wire_type)?,
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

impl WireMessage for Vector3 {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.float(1, self.x);
        enc.float(2, self.y);
        enc.float(3, self.z);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.x = dec.read_float(wire_type)?,
            2 => self.y = dec.read_float(wire_type)?,
            3 => self.z = dec.read_float(wire_type)?,
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

impl WireMessage for Vector4 {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.float(1, self.x);
        enc.float(2, self.y);
        enc.float(3, self.z);
        enc.float(4, self.w);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.x = dec.read_float(wire_type)?,
            2 => self.y = dec.read_float(wire_type)?,
            3 => self.z = dec.read_float(wire_type)?,
            4 => self.w = dec.read_float(wire_type)?,
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

impl WireMessage for Point2 {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.float(1, self.x);
        enc.float(2, self.y);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.x = dec.read_float(wire_type)?,
            2 => self.y = dec.read_float(wire_type)?,
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

/// `map<string, float>` entry
#[derive(Default)]
struct FloatEntry {
    key: String,
    value: f32,
}

impl WireMessage for FloatEntry {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.string(1, &self.key);
        enc.float(2, self.value);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.key = dec.read_string(wire_type)?,
            2 => self.value = dec.read_float(wire_type)?,
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

/// `map<string, Vector3>` entry
#[derive(Default)]
struct Vector3Entry {
    key: String,
    value: Vector3,
}

impl WireMessage for Vector3Entry {
    fn encode_fields(&self, enc: &mut WireEncoder) {
        enc.string(1, &self.key);
        enc.message(2, &self.value);
    }

    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError> {
        match field {
            1 => self.key = dec.read_string(wire_type)?,
            2 => self.value = dec.read_message(wire_type)?,
            _ => dec.skip(wire_type)?,
        }
        Ok(())
    }
}

fn hand_state(value: u64, field: &'static str) -> Result<HandState, CodecError> {
    HandState::from_u64(value).ok_or(CodecError::InvalidEnum { field, value })
}

fn tracking_state(value: u64, field: &'static str) -> Result<TrackingState, CodecError> {
    TrackingState::from_u64(value).ok_or(CodecError::InvalidEnum { field, value })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::bag::{BodyBag, GestureBag};
    use crate::codec::{decode, encode};

    fn sample_body(sensor: &str, tracking_id: u64) -> BodyRecord {
        let mut body = BodyRecord::with_skeleton(sensor, tracking_id);
        for (i, joint) in body.joints.iter_mut().enumerate() {
            joint.position = Vector3::new(i as f32 * 0.1, 1.0 - i as f32 * 0.05, 2.5);
            joint.orientation = Vector4::new(0.0, 0.7071, 0.0, 0.7071);
            joint.tracking_state = if i % 3 == 0 {
                TrackingState::Inferred
            } else {
                TrackingState::Tracked
            };
        }
        body.ambiguity = AmbiguityFlags::SITTING | AmbiguityFlags::MISSING_LEFT_ARM;
        body.hand_left_state = HandState::Open;
        body.hand_right_state = HandState::Lasso;
        body.hand_left_confidence = 1.0;
        body.priority = -3;
        body.lean = Point2::new(0.25, -0.5);
        body.lean_tracking_state = TrackingState::Tracked;
        body.float_data.insert("height".into(), 1.82);
        body.vector3_data.insert("center".into(), Vector3::new(0.0, 1.0, 2.0));
        body
    }

    #[test]
    fn test_body_bag_roundtrip_sizes() {
        for count in [0usize, 1, 6] {
            let bodies = (0..count as u64).map(|id| sample_body("kinect-1", id + 100)).collect();
            let bag = BodyBag::new("kinect-1", bodies);

            let decoded: BodyBag = decode(encode(&bag)).unwrap();
            assert_eq!(decoded.sensor_id, "kinect-1");
            assert_eq!(decoded.len(), count);
            assert_eq!(decoded, bag);
        }
    }

    #[test]
    fn test_gesture_bag_roundtrip() {
        let bag = GestureBag::new(
            "kinect-1",
            vec![
                Gesture::discrete("Wave", 9, 0.8),
                Gesture::continuous("Lean", 9, 0.3),
            ],
        );
        let decoded: GestureBag = decode(encode(&bag)).unwrap();
        assert_eq!(decoded, bag);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut a = sample_body("s", 1);
        let mut b = sample_body("s", 1);
        a.float_data.insert("zeta".into(), 1.0);
        a.float_data.insert("alpha".into(), 2.0);
        b.float_data.insert("alpha".into(), 2.0);
        b.float_data.insert("zeta".into(), 1.0);
        assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn test_unknown_ambiguity_bits_survive() {
        let mut body = BodyRecord::new("s", 1);
        body.ambiguity = AmbiguityFlags::from_bits(1 << 9 | 1);
        let decoded: BodyRecord = decode(encode(&body)).unwrap();
        assert_eq!(decoded.ambiguity.bits(), 1 << 9 | 1);
    }

    #[test]
    fn test_ambiguity_wider_than_32_bits() {
        // High bits must not be silently truncated away
        let mut enc = WireEncoder::new();
        enc.string(1, "kinect-1");
        enc.uint64(3, 1 << 40 | 1);
        let result: Result<BodyRecord, _> = decode(enc.finish());
        assert_eq!(
            result,
            Err(CodecError::InvalidEnum {
                field: "ambiguity",
                value: 1 << 40 | 1
            })
        );
    }

    #[test]
    fn test_invalid_joint_type() {
        // Joint { joint_type: 25 }
        let result: Result<Joint, _> = decode(Bytes::from_static(&[0x18, 25]));
        assert_eq!(
            result,
            Err(CodecError::InvalidEnum {
                field: "joint_type",
                value: 25
            })
        );
    }

    #[test]
    fn test_empty_bag_still_carries_sensor_id() {
        let bag = BodyBag::empty("kinect-1");
        let bytes = encode(&bag);
        assert!(!bytes.is_empty());
        let decoded: BodyBag = decode(bytes).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.sensor_id, "kinect-1");
    }

    #[test]
    fn test_garbage_is_an_error() {
        let result: Result<BodyBag, _> = decode(Bytes::from_static(&[0x12, 0x05, 0x0A]));
        assert_eq!(result, Err(CodecError::LengthOverflow));
    }
}
