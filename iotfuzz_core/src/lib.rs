//!
//! `iotfuzz` is a protocol fuzzer for IoT devices. It crafts syntactically valid but randomized
//! messages for HTTP, MQTT, CoAP and Modbus TCP (plus an unstructured `custom` mode), sends
//! them to a target and records one `FuzzingResult` per attempt.
//!
//! The building blocks:
//! - `Mutator`: seeded source of randomness and the five buffer mutations
//! - `Encoder`: builds one wire correct message per iteration, see [protocol]
//! - `Transport`: the stream or datagram connection to the target
//! - `FuzzSession`: drives N iterations against one target and collects the results
//!
//! Ready to use transports live in the `iotfuzz_common` crate.
//!
//! ```rs
//! #[tokio::main]
//! async fn main() {
//!     let config = SessionConfig::new("192.168.0.20", 502, Protocol::Modbus).with_iterations(50);
//!     let transport = TcpTransport::new(config.address(), TcpConfig::from(&config));
//!     let mut session = FuzzSession::new(config, transport).expect("valid config");
//!     for result in session.run().await.expect("target reachable") {
//!         println!("{:?}", result.details);
//!     }
//! }
//! ```
//!

#![deny(missing_docs)]
#![deny(unsafe_code, clippy::unwrap_used)]
#![warn(clippy::pedantic)]

/// Contains all `traits` a transport or an encoder has to implement.
pub mod traits;

/// Contains the fuzzing session and its statistics.
pub mod fuzz;

/// Manage the logger. Initializes the `tracing_subscriber` for binaries using `iotfuzz_core`.
pub mod log;

/// Output directory of the fuzzer
pub mod output;

/// Contains all the different errors `iotfuzz_core` can return.
pub mod error;

/// Mutation engine which can be used to mutate byte buffers.
pub mod mutator;

/// Protocol specific message encoders
pub mod protocol;

/// Configuration of a fuzzing session
pub mod config;

/// Result and protocol types shared by all modules
pub mod types;

pub use config::SessionConfig;
pub use error::FuzzError;
pub use fuzz::session::{FuzzSession, SessionState};
pub use types::{Details, FuzzingResult, Protocol, SessionReport};
