use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::native_tls;
use tracing::{debug, instrument};

/// Byte stream a session runs over, plain or TLS
pub trait IoStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IoStream for T {}

pub type BoxedStream = Box<dyn IoStream>;

/// Transport trait - opens the raw byte stream for a session
#[async_trait]
pub trait ProtoTransport: Send + Sync {
    /// Open a new connection
    async fn connect(&self) -> Result<BoxedStream, ExchangeError>;

    /// `host:port` the transport connects to
    fn endpoint(&self) -> String;
}

/// TCP connection settings
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Wrap the socket in TLS
    pub use_tls: bool,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            use_tls: true,
            nodelay: true,
        }
    }
}

/// TCP transport with optional TLS, backed by native-tls
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    config: TcpConfig,
}

impl TcpTransport {
    /// Create a TLS transport to `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            config: TcpConfig::default(),
        }
    }

    /// Create a transport without TLS, for local proxies and test venues
    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port).with_config(TcpConfig {
            use_tls: false,
            ..TcpConfig::default()
        })
    }

    /// Set custom TCP configuration
    pub fn with_config(mut self, config: TcpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn uses_tls(&self) -> bool {
        self.config.use_tls
    }
}

#[async_trait]
impl ProtoTransport for TcpTransport {
    #[instrument(skip(self), fields(endpoint = %self.endpoint(), tls = self.config.use_tls))]
    async fn connect(&self) -> Result<BoxedStream, ExchangeError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let tcp = tokio::time::timeout(
            connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| ExchangeError::ConnectionTimeout(format!("TCP connect to {}", self.endpoint())))?
        .map_err(|e| ExchangeError::NetworkError(format!("TCP connection failed: {}", e)))?;

        if self.config.nodelay {
            tcp.set_nodelay(true)?;
        }

        if !self.config.use_tls {
            debug!("Connected without TLS");
            return Ok(Box::new(tcp));
        }

        let connector = native_tls::TlsConnector::new()
            .map_err(|e| ExchangeError::NetworkError(format!("TLS setup failed: {}", e)))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let tls = tokio::time::timeout(connect_timeout, connector.connect(&self.host, tcp))
            .await
            .map_err(|_| ExchangeError::ConnectionTimeout("TLS handshake".to_string()))?
            .map_err(|e| ExchangeError::NetworkError(format!("TLS handshake failed: {}", e)))?;

        debug!("TLS session established");
        Ok(Box::new(tls))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_defaults_use_tls() {
        let transport = TcpTransport::new("demo.ctraderapi.com", 5035);
        assert!(transport.uses_tls());
        assert_eq!(transport.endpoint(), "demo.ctraderapi.com:5035");

        let plain = TcpTransport::plain("127.0.0.1", 9000);
        assert!(!plain.uses_tls());
    }

    #[tokio::test]
    async fn test_plain_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let transport = TcpTransport::plain("127.0.0.1", port);
        let mut stream = transport.connect().await.unwrap();
        stream.write_all(b"ping").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpTransport::plain("127.0.0.1", port).connect().await;
        assert!(matches!(result, Err(ExchangeError::NetworkError(_))));
    }
}
