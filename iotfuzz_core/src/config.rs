use crate::error::{FuzzError, FuzzOutcome};
use crate::types::Protocol;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of iterations of a session
pub const DEFAULT_ITERATIONS: usize = 100;
/// Default response timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// Default upper bound for randomly generated payloads
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 4096;
/// Default size of the buffer a single response is read into
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Immutable configuration of a single fuzzing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Target host name or IP address
    pub target: String,
    /// Target port
    pub port: u16,
    /// Protocol to craft messages for
    pub protocol: Protocol,
    /// Number of messages sent during the session
    pub iterations: usize,
    /// Timeout in millis for connecting, writing and awaiting a response
    pub timeout_ms: u64,
    /// Upper bound for random payloads
    pub max_payload_size: usize,
    /// Max bytes read as response of a single message
    pub read_buffer_size: usize,
    /// Seed for the random generator, a random seed is drawn if `None`
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: "127.0.0.1".to_owned(),
            port: 80,
            protocol: Protocol::Http,
            iterations: DEFAULT_ITERATIONS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Creates a config with the defaults for everything except the target tuple
    #[must_use]
    pub fn new(target: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            target: target.into(),
            port,
            protocol,
            ..Self::default()
        }
    }

    /// Sets the number of iterations
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the connect, write and response timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the upper bound for random payloads
    #[must_use]
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Seeds the random generator to make the session reproducible
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The timeout as `Duration`
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port` as used to connect to the target
    #[must_use]
    pub fn address(&self) -> String {
        if self.target.contains(':') && !self.target.starts_with('[') {
            // bare IPv6 address
            format!("[{}]:{}", self.target, self.port)
        } else {
            format!("{}:{}", self.target, self.port)
        }
    }

    /// Checks the config before a session is started.
    /// # Errors
    /// Returns `InvalidConfig` for an empty target, a zero timeout or a zero payload size.
    pub fn validate(&self) -> FuzzOutcome<()> {
        let err_msg = if self.target.trim().is_empty() {
            "target must not be empty"
        } else if self.timeout_ms == 0 {
            "timeout must be greater than zero"
        } else if self.max_payload_size == 0 {
            "max payload size must be greater than zero"
        } else if self.read_buffer_size == 0 {
            "read buffer size must be greater than zero"
        } else {
            return Ok(());
        };
        Err(FuzzError::InvalidConfig {
            err_msg: err_msg.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("10.0.0.7", 502, Protocol::Modbus);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_payload_size, 4096);
        assert_eq!(config.seed, None);
        assert_eq!(config.address(), "10.0.0.7:502");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ipv6_address() {
        let config = SessionConfig::new("::1", 1883, Protocol::Mqtt);
        assert_eq!(config.address(), "[::1]:1883");
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let config = SessionConfig::new("", 80, Protocol::Http);
        assert!(matches!(config.validate(), Err(FuzzError::InvalidConfig { .. })));

        let config = SessionConfig::new("localhost", 80, Protocol::Http).with_max_payload_size(0);
        assert!(config.validate().is_err());

        let config =
            SessionConfig::new("localhost", 80, Protocol::Http).with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = SessionConfig::new("localhost", 80, Protocol::Http).with_iterations(0);
        assert!(config.validate().is_ok());
    }
}
