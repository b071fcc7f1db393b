use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::FrameCodec;
use crate::core::kernel::transport::BoxedStream;
use crate::core::types::MessageId;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, instrument, trace, warn};

/// Protocol hooks the dispatcher needs from the outer message type
pub trait Envelope: prost::Message + Default + Sized + Send + 'static {
    /// Id echoed by the venue on the matching response
    fn correlation_id(&self) -> Option<&str>;

    fn is_heartbeat(&self) -> bool;

    /// Keep-alive message sent while the session is idle
    fn heartbeat() -> Self;
}

/// Anything the session produces that is not a reply to a pending request
#[derive(Debug)]
pub enum SessionEvent<M> {
    Message(M),
    Disconnected(String),
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Interval between outbound heartbeats
    pub heartbeat_interval: Duration,
    /// Largest frame accepted or sent
    pub max_frame_len: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            max_frame_len: crate::core::kernel::codec::DEFAULT_MAX_FRAME_LEN,
        }
    }
}

type Reply<M> = oneshot::Sender<Result<M, ExchangeError>>;
type Pending<M> = Arc<Mutex<HashMap<String, Reply<M>>>>;
type Writer<M> = Arc<tokio::sync::Mutex<SplitSink<Framed<BoxedStream, FrameCodec<M>>, M>>>;

/// Request/response correlation over one framed session.
///
/// A background task reads every inbound frame. Frames whose correlation id
/// matches a pending request complete that request; heartbeats are dropped;
/// everything else goes to the event channel. When the stream ends all
/// pending requests fail with [`ExchangeError::Disconnected`].
pub struct Dispatcher<M: Envelope> {
    endpoint: String,
    writer: Writer<M>,
    pending: Pending<M>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl<M: Envelope> Dispatcher<M> {
    /// Start reading from `stream` and sending heartbeats
    pub fn start(
        stream: BoxedStream,
        endpoint: String,
        config: DispatcherConfig,
        events: Option<mpsc::Sender<SessionEvent<M>>>,
    ) -> Self {
        let framed = Framed::new(stream, FrameCodec::with_max_frame_len(config.max_frame_len));
        let (sink, stream) = framed.split();

        let writer: Writer<M> = Arc::new(tokio::sync::Mutex::new(sink));
        let pending: Pending<M> = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            stream,
            endpoint.clone(),
            pending.clone(),
            connected.clone(),
            events,
        ));
        let heartbeat = tokio::spawn(heartbeat_loop(
            writer.clone(),
            connected.clone(),
            config.heartbeat_interval,
        ));

        Self {
            endpoint,
            writer,
            pending,
            connected,
            reader,
            heartbeat,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Send a message without waiting for a reply
    #[instrument(skip(self, message), fields(endpoint = %self.endpoint))]
    pub async fn send(&self, message: M) -> Result<(), ExchangeError> {
        if !self.is_connected() {
            return Err(ExchangeError::Disconnected(
                "session is not connected".to_string(),
            ));
        }

        let mut writer = self.writer.lock().await;
        writer.send(message).await.map_err(|e| {
            self.connected.store(false, Ordering::Release);
            e
        })
    }

    /// Send a message and wait for the frame carrying the same correlation id
    #[instrument(skip(self, message), fields(endpoint = %self.endpoint, client_msg_id = tracing::field::Empty))]
    pub async fn request(&self, message: M, timeout: Duration) -> Result<M, ExchangeError> {
        let client_msg_id = message
            .correlation_id()
            .ok_or_else(|| {
                ExchangeError::InvalidParameters("request has no client message id".to_string())
            })?
            .to_string();
        tracing::Span::current().record("client_msg_id", client_msg_id.as_str());

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| ExchangeError::Other("pending request table poisoned".to_string()))?;
            if pending.contains_key(&client_msg_id) {
                return Err(ExchangeError::InvalidParameters(format!(
                    "request {} is already in flight",
                    client_msg_id
                )));
            }
            pending.insert(client_msg_id.clone(), tx);
        }

        if let Err(e) = self.send(message).await {
            self.forget(&client_msg_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ExchangeError::Disconnected(
                "session closed before a response arrived".to_string(),
            )),
            Err(_) => {
                self.forget(&client_msg_id);
                warn!("No response within {:?}", timeout);
                Err(ExchangeError::Timeout {
                    client_msg_id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Stop background tasks and close the connection
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn shutdown(&self) {
        self.heartbeat.abort();
        self.reader.abort();
        self.connected.store(false, Ordering::Release);

        if let Err(e) = self.writer.lock().await.close().await {
            debug!("Error while closing session: {}", e);
        }
        fail_pending(&self.pending, "service stopped");
    }

    fn forget(&self, client_msg_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(client_msg_id);
        }
    }
}

impl<M: Envelope> Drop for Dispatcher<M> {
    fn drop(&mut self) {
        self.heartbeat.abort();
        self.reader.abort();
    }
}

async fn read_loop<M: Envelope>(
    mut stream: SplitStream<Framed<BoxedStream, FrameCodec<M>>>,
    endpoint: String,
    pending: Pending<M>,
    connected: Arc<AtomicBool>,
    events: Option<mpsc::Sender<SessionEvent<M>>>,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(message)) => {
                if message.is_heartbeat() {
                    trace!("Heartbeat received");
                    continue;
                }

                let waiter = message
                    .correlation_id()
                    .and_then(|id| pending.lock().ok()?.remove(id));

                match waiter {
                    Some(reply) => {
                        // caller may have given up already
                        let _ = reply.send(Ok(message));
                    }
                    None => {
                        if let Some(id) = message.correlation_id() {
                            log_unmatched(id);
                        }
                        forward(events.as_ref(), SessionEvent::Message(message));
                    }
                }
            }
            Some(Err(e)) => {
                error!("Session read error: {}", e);
                break e.to_string();
            }
            None => break "connection closed by peer".to_string(),
        }
    };

    connected.store(false, Ordering::Release);
    warn!(endpoint = %endpoint, "Disconnected: {}", reason);
    fail_pending(&pending, &reason);
    forward(events.as_ref(), SessionEvent::Disconnected(reason));
}

async fn heartbeat_loop<M: Envelope>(
    writer: Writer<M>,
    connected: Arc<AtomicBool>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !connected.load(Ordering::Acquire) {
            break;
        }
        if let Err(e) = writer.lock().await.send(M::heartbeat()).await {
            warn!("Failed to send heartbeat: {}", e);
            break;
        }
        trace!("Heartbeat sent");
    }
}

/// A reply whose request already timed out, or an id this session never sent
fn log_unmatched(id: &str) {
    match MessageId::parse(id) {
        Some(parsed) => warn!(
            action = parsed.action.as_deref().unwrap_or(""),
            client_msg_id = parsed.client_msg_id.as_deref().unwrap_or(""),
            host_mode = %parsed.host_mode,
            "Reply arrived with no pending request"
        ),
        None => debug!(correlation_id = id, "Unrecognized correlation id"),
    }
}

fn forward<M>(events: Option<&mpsc::Sender<SessionEvent<M>>>, event: SessionEvent<M>) {
    let Some(events) = events else {
        return;
    };
    if let Err(e) = events.try_send(event) {
        match e {
            mpsc::error::TrySendError::Full(_) => warn!("Event channel full, dropping message"),
            mpsc::error::TrySendError::Closed(_) => trace!("Event receiver dropped"),
        }
    }
}

fn fail_pending<M>(pending: &Pending<M>, reason: &str) {
    let drained: Vec<Reply<M>> = match pending.lock() {
        Ok(mut pending) => pending.drain().map(|(_, reply)| reply).collect(),
        Err(_) => return,
    };
    for reply in drained {
        let _ = reply.send(Err(ExchangeError::Disconnected(reason.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[derive(Clone, PartialEq, prost::Message)]
    struct TestFrame {
        #[prost(uint32, tag = "1")]
        kind: u32,
        #[prost(string, optional, tag = "2")]
        id: Option<String>,
    }

    impl Envelope for TestFrame {
        fn correlation_id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn is_heartbeat(&self) -> bool {
            self.kind == 51
        }

        fn heartbeat() -> Self {
            Self { kind: 51, id: None }
        }
    }

    fn frame(kind: u32, id: Option<&str>) -> TestFrame {
        TestFrame {
            kind,
            id: id.map(str::to_string),
        }
    }

    type Peer = Framed<tokio::io::DuplexStream, FrameCodec<TestFrame>>;

    fn pair(
        events: Option<mpsc::Sender<SessionEvent<TestFrame>>>,
        heartbeat_interval: Duration,
    ) -> (Dispatcher<TestFrame>, Peer) {
        let (client, server) = duplex(64 * 1024);
        let config = DispatcherConfig {
            heartbeat_interval,
            ..DispatcherConfig::default()
        };
        let dispatcher = Dispatcher::start(Box::new(client), "test".to_string(), config, events);
        (dispatcher, Framed::new(server, FrameCodec::new()))
    }

    #[tokio::test]
    async fn test_request_matches_response_by_id() {
        let (dispatcher, mut peer) = pair(None, Duration::from_secs(60));

        let server = tokio::spawn(async move {
            let req = peer.next().await.unwrap().unwrap();
            // unrelated frame first, then the reply
            peer.send(frame(7, Some("other"))).await.unwrap();
            peer.send(frame(req.kind + 1, req.id.as_deref())).await.unwrap();
            peer
        });

        let reply = dispatcher
            .request(frame(2100, Some("abc")), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply.kind, 2101);
        assert_eq!(reply.id.as_deref(), Some("abc"));
        assert_eq!(dispatcher.pending_count(), 0);

        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (dispatcher, _peer) = pair(None, Duration::from_secs(60));

        let result = dispatcher
            .request(frame(2104, Some("slow")), Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(ExchangeError::Timeout { ref client_msg_id, .. }) if client_msg_id == "slow"));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_requires_correlation_id() {
        let (dispatcher, _peer) = pair(None, Duration::from_secs(60));

        let result = dispatcher.request(frame(2104, None), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ExchangeError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_unmatched_messages_become_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let (_dispatcher, mut peer) = pair(Some(tx), Duration::from_secs(60));

        peer.send(TestFrame::heartbeat()).await.unwrap();
        peer.send(frame(2131, None)).await.unwrap();

        match rx.recv().await.unwrap() {
            SessionEvent::Message(msg) => assert_eq!(msg.kind, 2131),
            other => panic!("Expected message event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_requests() {
        let (tx, mut rx) = mpsc::channel(8);
        let (dispatcher, mut peer) = pair(Some(tx), Duration::from_secs(60));

        let server = tokio::spawn(async move {
            let _req = peer.next().await;
            drop(peer);
        });

        let result = dispatcher
            .request(frame(2102, Some("lost")), Duration::from_secs(5))
            .await;
        server.await.unwrap();

        assert!(matches!(result, Err(ExchangeError::Disconnected(_))));
        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::Disconnected(_))
        ));
        assert!(!dispatcher.is_connected());
    }

    #[tokio::test]
    async fn test_heartbeats_are_sent() {
        let (_dispatcher, mut peer) = pair(None, Duration::from_millis(20));

        let received = tokio::time::timeout(Duration::from_secs(2), peer.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(received.is_heartbeat());
    }

    #[tokio::test]
    async fn test_send_after_shutdown() {
        let (dispatcher, _peer) = pair(None, Duration::from_secs(60));
        dispatcher.shutdown().await;

        let result = dispatcher.send(frame(2104, Some("x"))).await;
        assert!(matches!(result, Err(ExchangeError::Disconnected(_))));
    }

    #[tokio::test]
    async fn test_shutdown_fails_in_flight_requests() {
        let (dispatcher, mut peer) = pair(None, Duration::from_secs(60));

        let request = dispatcher.request(frame(2102, Some("in-flight")), Duration::from_secs(5));
        let stop = async {
            let _req = peer.next().await;
            dispatcher.shutdown().await;
        };
        let (result, ()) = tokio::join!(request, stop);

        assert!(matches!(
            result,
            Err(ExchangeError::Disconnected(ref reason)) if reason == "service stopped"
        ));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_correlation_id_rejected() {
        let (dispatcher, mut peer) = pair(None, Duration::from_secs(60));

        let server = tokio::spawn(async move {
            let req = peer.next().await.unwrap().unwrap();
            peer.send(frame(2105, req.id.as_deref())).await.unwrap();
            peer
        });

        let (first, second) = tokio::join!(
            dispatcher.request(frame(2104, Some("dup")), Duration::from_secs(5)),
            dispatcher.request(frame(2104, Some("dup")), Duration::from_secs(5)),
        );

        assert_eq!(first.unwrap().kind, 2105);
        assert!(matches!(second, Err(ExchangeError::InvalidParameters(_))));
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_late_reply_becomes_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let (dispatcher, mut peer) = pair(Some(tx), Duration::from_secs(60));

        let server = tokio::spawn(async move {
            let req = peer.next().await.unwrap().unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            peer.send(frame(2105, req.id.as_deref())).await.unwrap();
            peer
        });

        let result = dispatcher
            .request(frame(2104, Some("demo#late")), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(ExchangeError::Timeout { .. })));

        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap() {
            Some(SessionEvent::Message(msg)) => {
                assert_eq!(msg.kind, 2105);
                assert_eq!(msg.id.as_deref(), Some("demo#late"));
            }
            other => panic!("Expected late reply event, got {:?}", other),
        }
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_full_event_channel_does_not_stall_reader() {
        let (tx, mut rx) = mpsc::channel(1);
        let (dispatcher, mut peer) = pair(Some(tx), Duration::from_secs(60));

        let server = tokio::spawn(async move {
            for kind in [1, 2, 3] {
                peer.send(frame(kind, None)).await.unwrap();
            }
            let req = peer.next().await.unwrap().unwrap();
            peer.send(frame(2105, req.id.as_deref())).await.unwrap();
            peer
        });

        // nothing drains the channel until the reply is in
        let reply = dispatcher
            .request(frame(2104, Some("after-burst")), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply.kind, 2105);

        match rx.recv().await {
            Some(SessionEvent::Message(msg)) => assert_eq!(msg.kind, 1),
            other => panic!("Expected first event, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        let _peer = server.await.unwrap();
    }
}
