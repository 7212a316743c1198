//! Protocol encoders building one randomized message per iteration.
//!
//! Each encoder honors the framing of its protocol (length fields, fixed headers) and reports
//! every random choice in the details of the message, so a campaign can be analyzed afterwards
//! without replaying the raw bytes.

/// CoAP requests
pub mod coap;
/// Unstructured payloads run through the mutation engine
pub mod custom;
/// HTTP/1.1 requests
pub mod http;
/// Modbus TCP frames
pub mod modbus;
/// MQTT control packets
pub mod mqtt;

use crate::config::SessionConfig;
use crate::error::FuzzError;
use crate::mutator::Mutator;
use crate::traits::{Encoded, Encoder};
use crate::types::Protocol;
use coap::CoapEncoder;
use custom::CustomEncoder;
use http::HttpEncoder;
use modbus::ModbusEncoder;
use mqtt::MqttEncoder;

/// Dispatches to the encoder matching the protocol of a session
#[derive(Debug, Clone)]
pub enum ProtocolEncoder {
    /// HTTP
    Http(HttpEncoder),
    /// MQTT
    Mqtt(MqttEncoder),
    /// CoAP
    Coap(CoapEncoder),
    /// Modbus
    Modbus(ModbusEncoder),
    /// Custom
    Custom(CustomEncoder),
}

impl ProtocolEncoder {
    /// Creates the encoder for `config.protocol`
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        let max = config.max_payload_size;
        match config.protocol {
            Protocol::Http => ProtocolEncoder::Http(HttpEncoder::new(config.address())),
            Protocol::Mqtt => ProtocolEncoder::Mqtt(MqttEncoder::new(max)),
            Protocol::Coap => ProtocolEncoder::Coap(CoapEncoder::new(max)),
            Protocol::Modbus => ProtocolEncoder::Modbus(ModbusEncoder::new(max)),
            Protocol::Custom => ProtocolEncoder::Custom(CustomEncoder::new(max)),
        }
    }
}

impl Encoder for ProtocolEncoder {
    fn protocol(&self) -> Protocol {
        match self {
            ProtocolEncoder::Http(e) => e.protocol(),
            ProtocolEncoder::Mqtt(e) => e.protocol(),
            ProtocolEncoder::Coap(e) => e.protocol(),
            ProtocolEncoder::Modbus(e) => e.protocol(),
            ProtocolEncoder::Custom(e) => e.protocol(),
        }
    }

    fn encode<R: rand::Rng>(&self, mutator: &mut Mutator<R>) -> Result<Encoded, FuzzError> {
        match self {
            ProtocolEncoder::Http(e) => e.encode(mutator),
            ProtocolEncoder::Mqtt(e) => e.encode(mutator),
            ProtocolEncoder::Coap(e) => e.encode(mutator),
            ProtocolEncoder::Modbus(e) => e.encode(mutator),
            ProtocolEncoder::Custom(e) => e.encode(mutator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_encoder_matches_config() {
        let mut mutator = Mutator::new(ChaChaRng::seed_from_u64(5));
        for protocol in Protocol::ALL {
            let config = SessionConfig::new("192.168.1.20", 8080, protocol).with_max_payload_size(64);
            let encoder = ProtocolEncoder::from_config(&config);
            assert_eq!(encoder.protocol(), protocol);
            let encoded = encoder.encode(&mut mutator).expect("encode");
            assert!(!encoded.bytes.is_empty());
            assert!(!encoded.details.is_empty());
        }
    }
}
