use iotfuzz_core::config::SessionConfig;
use iotfuzz_core::error::FuzzError;
use iotfuzz_core::traits::{Transport, TransportKind};
use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{ToSocketAddrs, UdpSocket, lookup_host};
use tokio::time::timeout;

/// Fire and forget UDP transport. Responses are never awaited.
///
/// The socket is not connected to the target, so ICMP port unreachable messages do not turn
/// into errors of later sends.
pub struct UdpTransport<T> {
    addr: T,
    target: Option<SocketAddr>,
    socket: Option<UdpSocket>,
    timeout: Duration,
}

impl<T: ToSocketAddrs> UdpTransport<T> {
    /// Create a instance of the UDP transport, `timeout` bounds the address lookup and
    /// every send
    pub fn new(addr: T, timeout: Duration) -> Self {
        Self {
            addr,
            target: None,
            socket: None,
            timeout,
        }
    }

    /// Creates the transport with the timeout of the session
    pub fn from_session(addr: T, config: &SessionConfig) -> Self {
        Self::new(addr, config.timeout())
    }
}

impl<T: ToSocketAddrs + Display> Transport for UdpTransport<T> {
    fn title(&self) -> String {
        format!("udp_client ({})", self.addr)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn connect(&mut self) -> Result<(), FuzzError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let target = timeout(self.timeout, lookup_host(&self.addr))
            .await??
            .next()
            .ok_or_else(|| FuzzError::ConnectionFailed {
                err_msg: format!("{} (no address found)", self.addr),
            })?;
        let bind = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind).await?;
        tracing::debug!("Sending datagrams to {target} from {}", socket.local_addr()?);
        self.socket = Some(socket);
        self.target = Some(target);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FuzzError> {
        self.socket = None;
        Ok(())
    }

    async fn send(&mut self, buf: &[u8]) -> Result<(), FuzzError> {
        let (Some(socket), Some(target)) = (self.socket.as_ref(), self.target) else {
            return Err(FuzzError::NotConnected);
        };
        match timeout(self.timeout, socket.send_to(buf, target)).await? {
            Ok(_) => Ok(()),
            Err(err) => Err(FuzzError::TransportWrite {
                err_msg: err.to_string(),
            }),
        }
    }

    async fn receive(&mut self, _buf: &mut [u8]) -> Result<Option<usize>, FuzzError> {
        Ok(None)
    }
}
