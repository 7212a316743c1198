//! Collection of common implementations for `iotfuzz_core`
//!
//! `iotfuzz_common` contains the ready to use `Transport` implementations and the entry
//! points that pick the transport matching the protocol of a session:
//!
//! - `Transport`
//!     - `TcpTransport`: One TCP connection for all messages, used for HTTP, MQTT, Modbus
//!       and the custom mode.
//!     - `UdpTransport`: Fire and forget datagrams, used for CoAP.
//!
//! Sessions are independent of each other, fuzzing several targets or protocols at once is
//! done by running one session per task.
//!
#![deny(missing_docs)]
#![deny(unsafe_code, clippy::unwrap_used)]
#![warn(clippy::pedantic)]

/// A collection of different `Transport` implementations
pub mod transport;

pub use transport::tcp::{TcpConfig, TcpTransport};
pub use transport::udp::UdpTransport;

use iotfuzz_core::traits::TransportKind;
use iotfuzz_core::{FuzzError, FuzzSession, FuzzingResult, SessionConfig, SessionReport};
use tokio_util::sync::CancellationToken;

/// Runs one session with the transport matching `config.protocol` and returns one result per
/// iteration.
/// # Errors
/// `ConnectionFailed` if the target is not reachable, `SessionAborted` if the connection was
/// lost for good during the session.
pub async fn fuzz(config: SessionConfig) -> Result<Vec<FuzzingResult>, FuzzError> {
    fuzz_report(config, CancellationToken::new())
        .await
        .map(|report| report.results)
}

/// Like `fuzz`, but returns the full report and can be cancelled. A cancelled session returns
/// `SessionAborted` with the results completed so far.
/// # Errors
/// See `fuzz`.
pub async fn fuzz_report(
    config: SessionConfig,
    cancel: CancellationToken,
) -> Result<SessionReport, FuzzError> {
    let address = config.address();
    match config.protocol.transport_kind() {
        TransportKind::Stream => {
            let transport = TcpTransport::new(address, TcpConfig::from(&config));
            let mut session = FuzzSession::new(config, transport)?;
            session.run_report(cancel).await
        }
        TransportKind::Datagram => {
            let transport = UdpTransport::from_session(address, &config);
            let mut session = FuzzSession::new(config, transport)?;
            session.run_report(cancel).await
        }
    }
}
