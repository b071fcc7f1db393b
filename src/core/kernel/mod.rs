/// Transport layer shared by the venue connectors
///
/// The kernel knows nothing about individual venue messages. It provides:
///
/// ## Transport
/// - `ProtoTransport` / `TcpTransport`: opens the TCP (optionally TLS) stream
/// - `FrameCodec`: length-prefixed protobuf framing over that stream
///
/// ## Dispatch
/// - `Dispatcher`: request/response correlation by client message id,
///   heartbeats, and forwarding of unsolicited messages as `SessionEvent`s
/// - `Envelope`: hooks the outer protocol message implements for the dispatcher
///
/// ## HTTP
/// - `RestClient` / `ReqwestRest`: used for OAuth token calls
///
/// # Example
/// ```rust,no_run
/// use ctrader_openapi::core::kernel::*;
/// use ctrader_openapi::ctrader::messages::ProtoMessage;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransport::new("demo.ctraderapi.com", 5035);
/// let stream = transport.connect().await?;
/// let dispatcher: Dispatcher<ProtoMessage> = Dispatcher::start(
///     stream,
///     transport.endpoint(),
///     DispatcherConfig::default(),
///     None,
/// );
/// # dispatcher.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod dispatcher;
pub mod rest;
pub mod transport;

// Re-export key types for convenience
pub use codec::FrameCodec;
pub use dispatcher::{Dispatcher, DispatcherConfig, Envelope, SessionEvent};
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use transport::{BoxedStream, IoStream, ProtoTransport, TcpConfig, TcpTransport};
