//! Wire encoding for bags, bodies, joints and gestures
//!
//! Encoding is deterministic: the same value always produces the same
//! bytes (maps are ordered, defaults omitted). Decoding tolerates unknown
//! fields so senders can add fields without breaking older consumers.

pub mod messages;
pub mod wire;

use bytes::Bytes;

use crate::error::CodecError;

pub use wire::{WireDecoder, WireEncoder, WireType};

/// A type with a field-numbered wire representation
pub trait WireMessage: Default {
    /// Write every field of `self`
    fn encode_fields(&self, enc: &mut WireEncoder);

    /// Merge one decoded field into `self`. Unknown fields must be skipped
    /// with [`WireDecoder::skip`].
    fn merge_field(
        &mut self,
        field: u32,
        wire_type: WireType,
        dec: &mut WireDecoder,
    ) -> Result<(), CodecError>;
}

/// Encode a message to bytes
pub fn encode<M: WireMessage>(message: &M) -> Bytes {
    let mut encoder = WireEncoder::new();
    message.encode_fields(&mut encoder);
    encoder.finish()
}

/// Decode a message from bytes
pub fn decode<M: WireMessage>(data: Bytes) -> Result<M, CodecError> {
    WireDecoder::new(data).read_fields()
}
