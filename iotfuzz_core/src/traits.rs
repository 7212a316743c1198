use crate::error::FuzzError;
use crate::mutator::Mutator;
use crate::types::{Details, Protocol};

/// How a transport talks to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connection oriented, every message is answered within the timeout or not at all
    Stream,
    /// Connectionless, responses are never awaited
    Datagram,
}

/// Transport layer to connect to the target.
///
/// A session owns exactly one transport and drives it strictly sequentially: `send` is always
/// followed by `receive` before the next message is sent.
pub trait Transport {
    /// The title used in logs and statistics
    fn title(&self) -> String;

    /// Stream or datagram
    fn kind(&self) -> TransportKind;

    /// Returns true while the underlying socket is usable
    fn is_connected(&self) -> bool;

    /// Opens the connection to the target. Must be bounded by the configured timeout.
    /// # Errors
    fn connect(&mut self) -> impl std::future::Future<Output = Result<(), FuzzError>>;

    /// Closes the current connection to the target
    /// # Errors
    fn close(&mut self) -> impl std::future::Future<Output = Result<(), FuzzError>>;

    /// Write one message to the target.
    /// # Errors
    /// `ConnectionClosed` if the target closed the connection, in this case the transport is
    /// no longer connected.
    fn send(&mut self, buf: &[u8]) -> impl std::future::Future<Output = Result<(), FuzzError>>;

    /// Read the response to the last message.
    /// - `Ok(Some(len))`: the target answered with `len` bytes
    /// - `Ok(None)`: no response is awaited on this transport
    /// # Errors
    /// `Timeout` if the target did not answer in time, the connection stays open.
    /// `ConnectionClosed` if the target closed the connection.
    fn receive(
        &mut self,
        buf: &mut [u8],
    ) -> impl std::future::Future<Output = Result<Option<usize>, FuzzError>>;
}

/// One message built by an `Encoder`
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// The wire bytes
    pub bytes: Vec<u8>,
    /// Every randomized choice that shaped `bytes`
    pub details: Details,
}

/// Builds one randomized but wire-correct message per call.
///
/// Encoders are pure: all randomness comes from the given mutator and they never touch the
/// network.
pub trait Encoder {
    /// The protocol of the messages
    fn protocol(&self) -> Protocol;

    /// Builds the next message
    /// # Errors
    fn encode<R: rand::Rng>(&self, mutator: &mut Mutator<R>) -> Result<Encoded, FuzzError>;
}
