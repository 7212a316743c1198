use crate::error::FuzzError;
use crate::mutator::Mutator;
use crate::traits::{Encoded, Encoder};
use crate::types::{Details, Protocol};

/// Length of the MBAP header: transaction id, protocol id, length, unit id
pub const MBAP_HEADER_LEN: usize = 7;

// Offset of the first byte counted by the length field
const LENGTH_FIELD_END: usize = 6;

/// Protocol identifier of Modbus
pub const PROTOCOL_ID: u16 = 0;

/// Public function codes sent to the target
pub const FUNCTION_CODES: [(u8, &str); 6] = [
    (0x01, "read_coils"),
    (0x02, "read_discrete_inputs"),
    (0x03, "read_holding_registers"),
    (0x04, "read_input_registers"),
    (0x05, "write_single_coil"),
    (0x06, "write_single_register"),
];

/// Builds Modbus TCP frames: MBAP header, function code and random data.
///
/// The length field of the header counts every byte after it: unit id, function code and data.
#[derive(Debug, Clone)]
pub struct ModbusEncoder {
    max_payload_size: usize,
}

impl ModbusEncoder {
    /// The data is capped so the length field still fits into 16 bits
    #[must_use]
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.min(usize::from(u16::MAX) - 2),
        }
    }
}

impl Encoder for ModbusEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Modbus
    }

    fn encode<R: rand::Rng>(&self, mutator: &mut Mutator<R>) -> Result<Encoded, FuzzError> {
        let transaction_id = mutator.gen_u16();
        let (function_code, function_name) = *mutator.choose(&FUNCTION_CODES);
        let unit_id = mutator.gen_u8();
        let data = mutator.gen_payload(self.max_payload_size);

        let length = u16::try_from(2 + data.len()).map_err(|_| FuzzError::InvalidConfig {
            err_msg: format!("modbus payload of {} bytes is too large", data.len()),
        })?;

        let mut bytes = Vec::with_capacity(MBAP_HEADER_LEN + 1 + data.len());
        bytes.extend_from_slice(&transaction_id.to_be_bytes());
        bytes.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.push(unit_id);
        bytes.push(function_code);
        bytes.extend_from_slice(&data);

        assert_eq!(
            declared_length(&bytes).map(usize::from),
            Some(bytes.len() - LENGTH_FIELD_END),
            "MBAP length does not match the frame"
        );

        let mut details = Details::new();
        details.insert("transaction_id".into(), transaction_id.into());
        details.insert("protocol_id".into(), PROTOCOL_ID.into());
        details.insert("length".into(), length.into());
        details.insert("unit_id".into(), unit_id.into());
        details.insert("function_code".into(), format!("{function_code:#x}").into());
        details.insert("function_name".into(), function_name.into());

        Ok(Encoded { bytes, details })
    }
}

/// Reads the length field of a MBAP header
#[must_use]
pub fn declared_length(frame: &[u8]) -> Option<u16> {
    let bytes = frame.get(4..6)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    proptest! {
        #[test]
        fn length_counts_every_byte_after_it(seed in any::<u64>(), max in 1usize..2048) {
            let mut mutator = Mutator::new(ChaChaRng::seed_from_u64(seed));
            let encoded = ModbusEncoder::new(max).encode(&mut mutator).expect("encode");
            let bytes = &encoded.bytes;

            let data_len = bytes.len() - MBAP_HEADER_LEN - 1;
            prop_assert!((1..=max).contains(&data_len));
            prop_assert_eq!(declared_length(bytes), Some(u16::try_from(2 + data_len).expect("u16")));
            prop_assert_eq!(
                declared_length(bytes).map(usize::from),
                Some(bytes.len() - LENGTH_FIELD_END)
            );
            prop_assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), PROTOCOL_ID);
            prop_assert!(FUNCTION_CODES.iter().any(|(fc, _)| *fc == bytes[7]));
        }
    }

    #[test]
    fn test_details_describe_header() {
        let mut mutator = Mutator::new(ChaChaRng::seed_from_u64(3));
        let encoded = ModbusEncoder::new(1).encode(&mut mutator).expect("encode");
        let bytes = &encoded.bytes;
        assert_eq!(bytes.len(), 9);
        assert_eq!(declared_length(bytes), Some(3));
        assert_eq!(encoded.details["length"], 3);
        assert_eq!(
            encoded.details["transaction_id"],
            u16::from_be_bytes([bytes[0], bytes[1]])
        );
        assert_eq!(encoded.details["unit_id"], bytes[6]);
        assert_eq!(
            encoded.details["function_code"],
            format!("{:#x}", bytes[7])
        );
    }

    #[test]
    fn test_declared_length_of_short_frame() {
        assert_eq!(declared_length(&[0, 1, 0, 0, 0]), None);
    }
}
