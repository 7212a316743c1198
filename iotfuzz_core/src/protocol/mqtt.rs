use crate::error::FuzzError;
use crate::mutator::Mutator;
use crate::traits::{Encoded, Encoder};
use crate::types::{Details, Protocol};

/// Client request to connect to a server
pub const CONNECT: u8 = 0x10;
/// Publish message
pub const PUBLISH: u8 = 0x30;
/// Subscribe request, the reserved flags of SUBSCRIBE are `0b0010`
pub const SUBSCRIBE: u8 = 0x82;
/// Client is disconnecting
pub const DISCONNECT: u8 = 0xE0;

/// Control packet types used as first byte of the fixed header
pub const PACKET_TYPES: [(u8, &str); 4] = [
    (CONNECT, "CONNECT"),
    (PUBLISH, "PUBLISH"),
    (SUBSCRIBE, "SUBSCRIBE"),
    (DISCONNECT, "DISCONNECT"),
];

/// Largest value the four byte remaining length can express
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Builds MQTT control packets with a random body.
///
/// The remaining length uses the variable byte integer encoding, so payloads of 128 bytes
/// and more stay wire valid.
#[derive(Debug, Clone)]
pub struct MqttEncoder {
    max_payload_size: usize,
}

impl MqttEncoder {
    /// Payloads are between 1 and `max_payload_size` bytes long
    #[must_use]
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.min(MAX_REMAINING_LENGTH),
        }
    }
}

impl Encoder for MqttEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Mqtt
    }

    fn encode<R: rand::Rng>(&self, mutator: &mut Mutator<R>) -> Result<Encoded, FuzzError> {
        let (packet_type, packet_name) = *mutator.choose(&PACKET_TYPES);
        let payload = mutator.gen_payload(self.max_payload_size);

        let remaining_length = encode_remaining_length(payload.len());
        assert_eq!(
            decode_remaining_length(&remaining_length),
            Some((payload.len(), remaining_length.len())),
            "remaining length does not match the payload"
        );

        let mut bytes = Vec::with_capacity(1 + remaining_length.len() + payload.len());
        bytes.push(packet_type);
        bytes.extend_from_slice(&remaining_length);
        bytes.extend_from_slice(&payload);

        let mut details = Details::new();
        details.insert("packet_type".into(), format!("{packet_type:#x}").into());
        details.insert("packet_name".into(), packet_name.into());
        details.insert("length".into(), payload.len().into());
        details.insert(
            "remaining_length_bytes".into(),
            remaining_length.len().into(),
        );

        Ok(Encoded { bytes, details })
    }
}

/// Encodes `len` as MQTT variable byte integer (7 bits per byte, high bit = continuation).
/// # Panics
/// Panics if `len` exceeds `MAX_REMAINING_LENGTH`.
#[must_use]
pub fn encode_remaining_length(mut len: usize) -> Vec<u8> {
    assert!(len <= MAX_REMAINING_LENGTH, "remaining length too large");
    let mut out = Vec::with_capacity(4);
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            return out;
        }
    }
}

/// Decodes a variable byte integer, returns the value and the number of bytes it occupied.
#[must_use]
pub fn decode_remaining_length(buf: &[u8]) -> Option<(usize, usize)> {
    let mut value = 0usize;
    for (i, byte) in buf.iter().take(4).enumerate() {
        value += usize::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_remaining_length_encoding() {
        assert_eq!(encode_remaining_length(0), vec![0x00]);
        assert_eq!(encode_remaining_length(127), vec![0x7f]);
        assert_eq!(encode_remaining_length(128), vec![0x80, 0x01]);
        assert_eq!(encode_remaining_length(16_383), vec![0xff, 0x7f]);
        assert_eq!(encode_remaining_length(16_384), vec![0x80, 0x80, 0x01]);
        assert_eq!(
            encode_remaining_length(MAX_REMAINING_LENGTH),
            vec![0xff, 0xff, 0xff, 0x7f]
        );
        assert_eq!(decode_remaining_length(&[0xff, 0xff, 0xff, 0xff]), None);
    }

    #[test]
    fn test_small_payload_uses_single_length_byte() {
        let mut mutator = Mutator::new(ChaChaRng::seed_from_u64(11));
        let encoder = MqttEncoder::new(127);
        for _ in 0..200 {
            let encoded = encoder.encode(&mut mutator).expect("encode");
            let payload_len = encoded.bytes.len() - 2;
            assert!(payload_len < 128);
            assert_eq!(usize::from(encoded.bytes[1]), payload_len);
            assert_eq!(encoded.details["length"], payload_len);
            assert!(PACKET_TYPES.iter().any(|(t, _)| *t == encoded.bytes[0]));
        }
    }

    proptest! {
        #[test]
        fn remaining_length_matches_payload(seed in any::<u64>(), max in 1usize..20_000) {
            let mut mutator = Mutator::new(ChaChaRng::seed_from_u64(seed));
            let encoded = MqttEncoder::new(max).encode(&mut mutator).expect("encode");
            let (len, used) = decode_remaining_length(&encoded.bytes[1..]).expect("valid length");
            prop_assert_eq!(len, encoded.bytes.len() - 1 - used);
            prop_assert!(len <= max);
        }
    }
}
