use crate::error::FuzzError;
use crate::mutator::Mutator;
use crate::traits::{Encoded, Encoder};
use crate::types::{Details, Protocol};

/// Version 1 in the two most significant bits of the first header byte
pub const VERSION: u8 = 0x40;
/// Mask of the version bits
pub const VERSION_MASK: u8 = 0xC0;

/// Request methods placed in the low bits of the first header byte
pub const METHODS: [(u8, &str); 4] = [(0x01, "GET"), (0x02, "POST"), (0x03, "PUT"), (0x04, "DELETE")];

/// Max length of the token following the header
pub const MAX_TOKEN_LEN: usize = 8;

/// Fixed header length
pub const HEADER_LEN: usize = 4;

// Largest UDP payload over IPv4
const MAX_DATAGRAM_LEN: usize = 65_507;

/// Builds CoAP requests: a 4 byte header, a 0 to 8 byte token and a random payload.
///
/// No options are emitted, the second header byte is always zero.
#[derive(Debug, Clone)]
pub struct CoapEncoder {
    max_payload_size: usize,
}

impl CoapEncoder {
    /// The payload is capped so the whole message still fits into a single datagram
    #[must_use]
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.min(MAX_DATAGRAM_LEN - HEADER_LEN - MAX_TOKEN_LEN),
        }
    }
}

impl Encoder for CoapEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Coap
    }

    fn encode<R: rand::Rng>(&self, mutator: &mut Mutator<R>) -> Result<Encoded, FuzzError> {
        let (method, method_name) = *mutator.choose(&METHODS);
        let token_length = mutator.gen_range_inclusive(0, MAX_TOKEN_LEN);
        let message_id = mutator.gen_u16();

        let [id_high, id_low] = message_id.to_be_bytes();
        let header = [VERSION | method, 0, id_high, id_low];
        assert_eq!(header[0] & VERSION_MASK, VERSION, "invalid CoAP version");

        let token = mutator.gen_bytes(token_length);
        let payload = mutator.gen_payload(self.max_payload_size);

        let mut bytes = Vec::with_capacity(HEADER_LEN + token.len() + payload.len());
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&token);
        bytes.extend_from_slice(&payload);

        let mut details = Details::new();
        details.insert("method".into(), format!("{method:#x}").into());
        details.insert("method_name".into(), method_name.into());
        details.insert("message_id".into(), message_id.into());
        details.insert("token_length".into(), token_length.into());
        details.insert("payload_length".into(), payload.len().into());

        Ok(Encoded { bytes, details })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    proptest! {
        #[test]
        fn header_is_well_formed(seed in any::<u64>()) {
            let mut mutator = Mutator::new(ChaChaRng::seed_from_u64(seed));
            let encoded = CoapEncoder::new(256).encode(&mut mutator).expect("encode");
            let bytes = &encoded.bytes;

            prop_assert_eq!(bytes[0] & VERSION_MASK, VERSION);
            prop_assert!(METHODS.iter().any(|(m, _)| *m == bytes[0] & 0x3f));
            prop_assert_eq!(bytes[1], 0);

            let message_id = u16::from_be_bytes([bytes[2], bytes[3]]);
            prop_assert_eq!(&encoded.details["message_id"], &serde_json::Value::from(message_id));

            let token_length = encoded.details["token_length"].as_u64().expect("token length");
            let payload_length = encoded.details["payload_length"].as_u64().expect("payload length");
            prop_assert!(token_length <= 8);
            prop_assert!((1..=256).contains(&payload_length));
            prop_assert_eq!(bytes.len() as u64, 4 + token_length + payload_length);
        }
    }

    #[test]
    fn test_payload_fits_into_datagram() {
        let encoder = CoapEncoder::new(usize::MAX);
        assert_eq!(encoder.max_payload_size, 65_507 - 4 - 8);
    }
}
