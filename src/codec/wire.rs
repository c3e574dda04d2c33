//! Field-numbered binary wire format
//!
//! Protobuf-compatible encoding, so consumers written against the same
//! field numbers in other languages can read the bags.
//!
//! Each field is a key followed by a payload:
//! ```text
//! key = (field_number << 3) | wire_type      (varint)
//!
//! wire type 0 - Varint (unsigned LEB128; int32 sign-extended to 64 bits)
//! wire type 1 - 64-bit little endian        (skipped when unknown)
//! wire type 2 - Length-delimited            (strings, nested messages)
//! wire type 3 - Start group                 (deprecated, rejected)
//! wire type 4 - End group                   (deprecated, rejected)
//! wire type 5 - 32-bit little endian        (floats)
//! ```
//!
//! Scalar fields holding their default value are omitted. Nested messages
//! are always written so repeated entries keep their position.
//! Unknown fields are skipped on decode, which keeps old readers working
//! against newer senders.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;

use super::WireMessage;

/// Maximum nesting depth for messages (bag > body > joint > vector is 4)
const MAX_NESTING_DEPTH: usize = 16;

/// Highest valid field number
const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

/// Wire type of an encoded field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::Fixed32),
            other => Err(CodecError::InvalidWireType(other)),
        }
    }
}

/// Message encoder
pub struct WireEncoder {
    buf: BytesMut,
}

impl WireEncoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Create encoder with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the encoded bytes and reset encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Unsigned varint field
    pub fn uint64(&mut self, field: u32, value: u64) {
        if value != 0 {
            self.write_key(field, WireType::Varint);
            self.write_varint(value);
        }
    }

    /// Signed 32-bit field; negatives take ten bytes, as on every other
    /// protobuf implementation
    pub fn int32(&mut self, field: u32, value: i32) {
        if value != 0 {
            self.write_key(field, WireType::Varint);
            self.write_varint(value as i64 as u64);
        }
    }

    pub fn bool(&mut self, field: u32, value: bool) {
        if value {
            self.write_key(field, WireType::Varint);
            self.write_varint(1);
        }
    }

    /// 32-bit float field. Negative zero is kept.
    pub fn float(&mut self, field: u32, value: f32) {
        if value.to_bits() != 0 {
            self.write_key(field, WireType::Fixed32);
            self.buf.put_f32_le(value);
        }
    }

    pub fn string(&mut self, field: u32, value: &str) {
        if !value.is_empty() {
            self.write_key(field, WireType::LengthDelimited);
            self.write_varint(value.len() as u64);
            self.buf.put_slice(value.as_bytes());
        }
    }

    /// Nested message, always written
    pub fn message<M: WireMessage>(&mut self, field: u32, message: &M) {
        let mut nested = WireEncoder::with_capacity(64);
        message.encode_fields(&mut nested);
        let body = nested.finish();

        self.write_key(field, WireType::LengthDelimited);
        self.write_varint(body.len() as u64);
        self.buf.put_slice(&body);
    }

    /// One nested message per element
    pub fn repeated<M: WireMessage>(&mut self, field: u32, messages: &[M]) {
        for message in messages {
            self.message(field, message);
        }
    }

    fn write_key(&mut self, field: u32, wire_type: WireType) {
        self.write_varint(((field as u64) << 3) | wire_type as u64);
    }

    fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }
}

impl Default for WireEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Message decoder
pub struct WireDecoder {
    buf: Bytes,
    depth: usize,
}

impl WireDecoder {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, depth: 0 }
    }

    fn nested(buf: Bytes, depth: usize) -> Self {
        Self { buf, depth }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Read the next field key, or `None` at the end of the message
    pub fn next_field(&mut self) -> Result<Option<(u32, WireType)>, CodecError> {
        if !self.buf.has_remaining() {
            return Ok(None);
        }
        let key = self.read_varint()?;
        let wire_type = WireType::from_u8((key & 0x07) as u8)?;
        let field = key >> 3;
        if field == 0 || field > MAX_FIELD_NUMBER {
            return Err(CodecError::InvalidFieldNumber(field));
        }
        Ok(Some((field as u32, wire_type)))
    }

    pub fn read_uint64(&mut self, wire_type: WireType) -> Result<u64, CodecError> {
        expect(wire_type, WireType::Varint)?;
        self.read_varint()
    }

    /// int32 is sent sign-extended; truncation recovers the value
    pub fn read_int32(&mut self, wire_type: WireType) -> Result<i32, CodecError> {
        expect(wire_type, WireType::Varint)?;
        Ok(self.read_varint()? as i64 as i32)
    }

    pub fn read_bool(&mut self, wire_type: WireType) -> Result<bool, CodecError> {
        expect(wire_type, WireType::Varint)?;
        Ok(self.read_varint()? != 0)
    }

    pub fn read_float(&mut self, wire_type: WireType) -> Result<f32, CodecError> {
        expect(wire_type, WireType::Fixed32)?;
        if self.buf.remaining() < 4 {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(self.buf.get_f32_le())
    }

    pub fn read_string(&mut self, wire_type: WireType) -> Result<String, CodecError> {
        let bytes = self.read_length_delimited(wire_type)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Decode a nested message
    pub fn read_message<M: WireMessage>(&mut self, wire_type: WireType) -> Result<M, CodecError> {
        let body = self.read_length_delimited(wire_type)?;
        if self.depth + 1 > MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep);
        }
        let mut nested = WireDecoder::nested(body, self.depth + 1);
        nested.read_fields()
    }

    /// Decode fields until the buffer is exhausted
    pub fn read_fields<M: WireMessage>(&mut self) -> Result<M, CodecError> {
        let mut message = M::default();
        while let Some((field, wire_type)) = self.next_field()? {
            message.merge_field(field, wire_type, self)?;
        }
        Ok(message)
    }

    /// Skip a field this reader does not know
    pub fn skip(&mut self, wire_type: WireType) -> Result<(), CodecError> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => self.advance(8)?,
            WireType::LengthDelimited => {
                self.read_length_delimited(wire_type)?;
            }
            WireType::Fixed32 => self.advance(4)?,
            WireType::StartGroup | WireType::EndGroup => {
                return Err(CodecError::UnsupportedWireType(wire_type as u8));
            }
        }
        Ok(())
    }

    fn read_length_delimited(&mut self, wire_type: WireType) -> Result<Bytes, CodecError> {
        expect(wire_type, WireType::LengthDelimited)?;
        let len = self.read_varint()?;
        if len > self.buf.remaining() as u64 {
            return Err(CodecError::LengthOverflow);
        }
        Ok(self.buf.split_to(len as usize))
    }

    fn advance(&mut self, n: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < n {
            return Err(CodecError::UnexpectedEof);
        }
        self.buf.advance(n);
        Ok(())
    }

    fn read_varint(&mut self) -> Result<u64, CodecError> {
        let mut value: u64 = 0;
        for i in 0..10 {
            if !self.buf.has_remaining() {
                return Err(CodecError::UnexpectedEof);
            }
            let byte = self.buf.get_u8();
            // Tenth byte may only carry the top bit of a u64
            if i == 9 && byte > 0x01 {
                return Err(CodecError::VarintOverflow);
            }
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarintOverflow)
    }
}

fn expect(actual: WireType, expected: WireType) -> Result<(), CodecError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CodecError::InvalidWireType(actual as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        count: u64,
        delta: i32,
        ratio: f32,
        label: String,
        flag: bool,
    }

    impl WireMessage for Sample {
        fn encode_fields(&self, enc: &mut WireEncoder) {
            enc.uint64(1, self.count);
            enc.int32(2, self.delta);
            enc.float(3, self.ratio);
            enc.string(4, &self.label);
            enc.bool(5, self.flag);
        }

        fn merge_field(
            &mut self,
            field: u32,
            wire_type: WireType,
            dec: &mut WireDecoder,
        ) -> Result<(), CodecError> {
            match field {
                1 => self.count = dec.read_uint64(wire_type)?,
                2 => self.delta = dec.read_int32(wire_type)?,
                3 => self.ratio = dec.read_float(wire_type)?,
                4 => self.label = dec.read_string(wire_type)?,
                5 => self.flag = dec.read_bool(wire_type)?,
                _ => dec.skip(wire_type)?,
            }
            Ok(())
        }
    }

    fn encode_sample(sample: &Sample) -> Bytes {
        let mut enc = WireEncoder::new();
        sample.encode_fields(&mut enc);
        enc.finish()
    }

    #[test]
    fn test_known_protobuf_bytes() {
        // field 1 = 150 is the canonical protobuf example: 08 96 01
        let bytes = encode_sample(&Sample {
            count: 150,
            ..Default::default()
        });
        assert_eq!(&bytes[..], &[0x08, 0x96, 0x01]);

        let bytes = encode_sample(&Sample {
            label: "hi".into(),
            ..Default::default()
        });
        assert_eq!(&bytes[..], &[0x22, 0x02, b'h', b'i']);

        let bytes = encode_sample(&Sample {
            ratio: 1.0,
            ..Default::default()
        });
        assert_eq!(&bytes[..], &[0x1D, 0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn test_defaults_are_omitted() {
        assert!(encode_sample(&Sample::default()).is_empty());
    }

    #[test]
    fn test_negative_int32() {
        let sample = Sample {
            delta: -1,
            ..Default::default()
        };
        let bytes = encode_sample(&sample);
        // key + ten varint bytes
        assert_eq!(bytes.len(), 11);
        let decoded: Sample = WireDecoder::new(bytes).read_fields().unwrap();
        assert_eq!(decoded.delta, -1);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut enc = WireEncoder::new();
        enc.uint64(1, 7);
        enc.string(9, "from a newer sender");
        enc.float(10, 2.5);
        enc.uint64(11, u64::MAX);
        enc.bool(5, true);
        let decoded: Sample = WireDecoder::new(enc.finish()).read_fields().unwrap();
        assert_eq!(decoded.count, 7);
        assert!(decoded.flag);
    }

    #[test]
    fn test_truncated_buffer() {
        let bytes = encode_sample(&Sample {
            label: "truncated".into(),
            ..Default::default()
        });
        let cut = bytes.slice(..bytes.len() - 3);
        let result: Result<Sample, _> = WireDecoder::new(cut).read_fields();
        assert_eq!(result, Err(CodecError::LengthOverflow));

        let result: Result<Sample, _> = WireDecoder::new(Bytes::from_static(&[0x08, 0x96])).read_fields();
        assert_eq!(result, Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn test_wrong_wire_type() {
        // field 4 (string) sent as varint
        let result: Result<Sample, _> = WireDecoder::new(Bytes::from_static(&[0x20, 0x01])).read_fields();
        assert_eq!(result, Err(CodecError::InvalidWireType(0)));
    }

    #[test]
    fn test_invalid_keys() {
        let result: Result<Sample, _> = WireDecoder::new(Bytes::from_static(&[0x07])).read_fields();
        assert_eq!(result, Err(CodecError::InvalidWireType(7)));

        let result: Result<Sample, _> = WireDecoder::new(Bytes::from_static(&[0x00, 0x00])).read_fields();
        assert_eq!(result, Err(CodecError::InvalidFieldNumber(0)));

        // unknown field 9 sent as a group
        let result: Result<Sample, _> = WireDecoder::new(Bytes::from_static(&[0x4B])).read_fields();
        assert_eq!(result, Err(CodecError::UnsupportedWireType(3)));
    }

    #[test]
    fn test_varint_overflow() {
        let bytes = Bytes::from_static(&[0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
        let result: Result<Sample, _> = WireDecoder::new(bytes).read_fields();
        assert_eq!(result, Err(CodecError::VarintOverflow));
    }
}
