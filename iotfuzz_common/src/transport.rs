/// Implements the `Transport` trait for TCP
pub mod tcp;

/// Implements the `Transport` trait for UDP
pub mod udp;

use std::io::ErrorKind;

/// Errors meaning the peer is gone and the connection has to be opened again
pub(crate) fn is_connection_lost(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}
