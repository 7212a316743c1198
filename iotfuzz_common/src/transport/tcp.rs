use super::is_connection_lost;
use iotfuzz_core::config::SessionConfig;
use iotfuzz_core::error::FuzzError;
use iotfuzz_core::traits::{Transport, TransportKind};
use std::fmt::Display;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;

/// Tcp Transporter config
#[derive(Clone, Debug)]
pub struct TcpConfig {
    /// connect timeout in millis
    pub connect_timeout: u64,
    /// read timeout in millis, a message without response within it counts as timeout
    pub read_timeout: u64,
    /// write timeout in millis
    pub write_timeout: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: iotfuzz_core::config::DEFAULT_TIMEOUT_MS,
            read_timeout: iotfuzz_core::config::DEFAULT_TIMEOUT_MS,
            write_timeout: iotfuzz_core::config::DEFAULT_TIMEOUT_MS,
        }
    }
}

impl From<&SessionConfig> for TcpConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            connect_timeout: config.timeout_ms,
            read_timeout: config.timeout_ms,
            write_timeout: config.timeout_ms,
        }
    }
}

/// Basic TCP Client Transport Layer. One connection is kept open for all messages.
pub struct TcpTransport<T> {
    addr: T,
    stream: Option<TcpStream>,
    config: TcpConfig,
}

impl<T: ToSocketAddrs> TcpTransport<T> {
    /// Create a instance of Tcp Transport
    pub fn new(addr: T, config: TcpConfig) -> Self {
        Self {
            addr,
            stream: None,
            config,
        }
    }
}

impl<T: ToSocketAddrs + Display> Transport for TcpTransport<T> {
    fn title(&self) -> String {
        format!("tcp_client ({})", self.addr)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<(), FuzzError> {
        let stream = timeout(
            Duration::from_millis(self.config.connect_timeout),
            TcpStream::connect(&self.addr),
        )
        .await??;
        let _ = stream.set_nodelay(true);
        tracing::debug!("Connected to {}", self.addr);
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FuzzError> {
        let stream = self.stream.take();
        if let Some(mut stream) = stream {
            let _ = stream.flush().await;
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    async fn send(&mut self, buf: &[u8]) -> Result<(), FuzzError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(FuzzError::NotConnected);
        };
        match timeout(
            Duration::from_millis(self.config.write_timeout),
            stream.write_all(buf),
        )
        .await?
        {
            Ok(()) => Ok(()),
            Err(err) if is_connection_lost(&err) => {
                self.stream = None;
                Err(FuzzError::ConnectionClosed)
            }
            Err(err) => Err(FuzzError::TransportWrite {
                err_msg: err.to_string(),
            }),
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>, FuzzError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(FuzzError::NotConnected);
        };
        match timeout(Duration::from_millis(self.config.read_timeout), stream.read(buf)).await? {
            Ok(0) => {
                self.stream = None;
                Err(FuzzError::ConnectionClosed)
            }
            Ok(size) => Ok(Some(size)),
            Err(err) if is_connection_lost(&err) => {
                self.stream = None;
                Err(FuzzError::ConnectionClosed)
            }
            Err(err) => Err(FuzzError::TransportRead {
                err_msg: err.to_string(),
            }),
        }
    }
}
