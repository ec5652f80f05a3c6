use crate::prelude::*;

use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// One reply is read with a single call into a buffer of this size; the
/// BMU never sends more and replies are not reassembled.
pub const READ_BUFFER_SIZE: usize = 1024;
const TCP_KEEPALIVE_SECS: u64 = 60;

/// Connection-oriented byte stream the poller talks through.
#[async_trait]
pub trait Transport: Send {
    async fn open(&mut self) -> Result<(), TransportError>;

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Whatever a single read delivers within `max_wait`. An orderly close by
    /// the peer is `TransportError::Closed`, never an empty buffer.
    async fn read(&mut self, max_wait: Duration) -> Result<Vec<u8>, TransportError>;

    /// Idempotent; closing a transport that was never opened is fine.
    async fn close(&mut self);
}

pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    use_tcp_nodelay: bool,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
            connect_timeout: config::DEFAULT_CONNECT_TIMEOUT,
            use_tcp_nodelay: true,
            stream: None,
        }
    }

    pub fn from_config(battery: &config::Battery) -> Self {
        Self {
            host: battery.host().to_owned(),
            port: battery.port(),
            connect_timeout: battery.connect_timeout(),
            use_tcp_nodelay: battery.use_tcp_nodelay(),
            stream: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        use net2::TcpStreamExt;

        info!("connecting to battery at {}:{}", self.host, self.port);

        let address = (self.host.clone(), self.port);
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::Io(e)),
            Err(_) => return Err(TransportError::ConnectTimeout(self.connect_timeout)),
        };

        // keepalive is only reachable through the std socket
        let std_stream = stream.into_std()?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("Failed to set TCP keepalive: {}", e);
        }
        let stream = TcpStream::from_std(std_stream)?;

        if self.use_tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        debug!("{}:{}: connected", self.host, self.port);
        self.stream = Some(stream);

        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        debug!("TX {}", Utils::hex(data));

        let stream = self.stream()?;
        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn read(&mut self, max_wait: Duration) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream()?;
        let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

        let len = match tokio::time::timeout(max_wait, stream.read_buf(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(TransportError::Io(e)),
            Err(_) => return Err(TransportError::Timeout(max_wait)),
        };

        if len == 0 {
            return Err(TransportError::Closed);
        }

        debug!("RX {}", Utils::hex(&buf));

        Ok(buf.to_vec())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("{}:{}: shutdown failed: {}", self.host, self.port, e);
            }
            debug!("{}:{}: disconnected", self.host, self.port);
        }
    }
}
