use crate::config::SessionConfig;
use crate::error::FuzzError;
use crate::fuzz::stats::SessionStats;
use crate::traits::TransportKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Protocol specific metadata describing every randomized choice of one message.
pub type Details = BTreeMap<String, serde_json::Value>;

/// The protocols `iotfuzz` is able to craft messages for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// HTTP/1.1 requests with a JSON body
    Http,
    /// MQTT control packets
    Mqtt,
    /// CoAP requests over UDP
    Coap,
    /// Modbus TCP frames with a MBAP header
    Modbus,
    /// Unstructured random bytes passed through the mutation engine
    Custom,
}

impl Protocol {
    /// All supported protocols
    pub const ALL: [Protocol; 5] = [
        Protocol::Http,
        Protocol::Mqtt,
        Protocol::Coap,
        Protocol::Modbus,
        Protocol::Custom,
    ];

    /// Returns the lowercase name used on the command line and in reports
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Mqtt => "mqtt",
            Protocol::Coap => "coap",
            Protocol::Modbus => "modbus",
            Protocol::Custom => "custom",
        }
    }

    /// CoAP is carried over datagrams, everything else over a stream connection.
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        match self {
            Protocol::Coap => TransportKind::Datagram,
            Protocol::Http | Protocol::Mqtt | Protocol::Modbus | Protocol::Custom => {
                TransportKind::Stream
            }
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FuzzError::InvalidConfig {
                err_msg: format!("unknown protocol `{s}` (expected http|mqtt|coap|modbus|custom)"),
            })
    }
}

/// The outcome of a single fuzzing iteration.
///
/// Byte buffers are serialized as standard base64 strings so the JSON form stays lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzingResult {
    /// Protocol the message was built for
    pub protocol: Protocol,
    /// Exact bytes transmitted (empty when building the message already failed)
    #[serde(with = "base64_bytes")]
    pub input: Vec<u8>,
    /// Bytes received from the target within the timeout
    #[serde(with = "base64_bytes_opt")]
    pub response: Option<Vec<u8>>,
    /// Human readable failure description
    pub error: Option<String>,
    /// Randomized choices made while building the message
    pub details: Details,
}

impl FuzzingResult {
    /// A result for a message that was sent successfully.
    #[must_use]
    pub fn sent(
        protocol: Protocol,
        input: Vec<u8>,
        response: Option<Vec<u8>>,
        details: Details,
    ) -> Self {
        Self {
            protocol,
            input,
            response,
            error: None,
            details,
        }
    }

    /// A result for an iteration that failed. The error type is added to the details.
    #[must_use]
    pub fn failed(protocol: Protocol, input: Vec<u8>, err: &FuzzError, mut details: Details) -> Self {
        details.insert("error_type".into(), err.error_type().into());
        Self {
            protocol,
            input,
            response: None,
            error: Some(err.to_string()),
            details,
        }
    }

    /// Returns true if the target answered this iteration
    #[must_use]
    pub fn has_response(&self) -> bool {
        self.response.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// Everything a finished session produced, ready to be stored by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// The configuration the session was started with
    pub config: SessionConfig,
    /// Seed of the random generator, replaying it reproduces every input
    pub seed: u64,
    /// Counters collected while running
    pub stats: SessionStats,
    /// One entry per iteration in iteration order
    pub results: Vec<FuzzingResult>,
}

impl SessionReport {
    /// One line summary of the session
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} {}:{} seed={} results={} responses={} unique={} timeouts={} errors={}",
            self.config.protocol,
            self.config.target,
            self.config.port,
            self.seed,
            self.results.len(),
            self.stats.total_responses,
            self.stats.total_unique_responses,
            self.stats.total_timeouts,
            self.stats.total_errors,
        )
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("MQTT".parse::<Protocol>().ok(), Some(Protocol::Mqtt));
        assert_eq!(" coap ".parse::<Protocol>().ok(), Some(Protocol::Coap));
        assert!("ftp".parse::<Protocol>().is_err());
        for protocol in Protocol::ALL {
            assert_eq!(protocol.to_string().parse::<Protocol>().ok(), Some(protocol));
        }
    }

    #[test]
    fn test_only_coap_is_datagram() {
        for protocol in Protocol::ALL {
            let expected = if protocol == Protocol::Coap {
                TransportKind::Datagram
            } else {
                TransportKind::Stream
            };
            assert_eq!(protocol.transport_kind(), expected);
        }
    }

    #[test]
    fn test_result_json_is_lossless() {
        let mut details = Details::new();
        details.insert("function_code".into(), "0x3".into());
        let result = FuzzingResult::sent(
            Protocol::Modbus,
            vec![0x00, 0xff, 0x10, 0x80],
            Some(vec![0xde, 0xad]),
            details,
        );
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["input"], "AP8QgA==");
        assert_eq!(json["response"], "3q0=");
        assert_eq!(json["protocol"], "modbus");

        let back: FuzzingResult = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, result);
    }

    #[test]
    fn test_failed_result_records_error_type() {
        let result = FuzzingResult::failed(
            Protocol::Http,
            b"GET / HTTP/1.1\r\n".to_vec(),
            &FuzzError::ConnectionClosed,
            Details::new(),
        );
        assert!(result.response.is_none());
        assert!(!result.has_response());
        assert_eq!(result.details["error_type"], "connection_closed");
        assert_eq!(
            result.error.as_deref(),
            Some("Connection was closed by the target")
        );
    }
}
