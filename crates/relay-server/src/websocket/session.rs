//! WebSocket session lifecycle of one live connection, from upgrade through
//! disconnect.
//!
//! The session owns the socket. Its receive loop decodes frames and hands
//! them to the router; a companion writer task drains the connection's
//! outbound queue and sends keepalive pings. The session closes on the first
//! read failure, on an undecodable frame, when the connection's termination
//! token fires, or at server shutdown. Teardown always deregisters the
//! connection (if it is still the registered one) and then stops the writer.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use relay_core::{ChatMessage, Identity};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::LiveConnection;
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_REPLACED_TOTAL, WS_CONNECTIONS_TOTAL,
    WS_CONNECTION_DURATION_SECONDS, WS_DISCONNECTIONS_TOTAL,
};
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;

/// How long the writer gets to flush a close frame after teardown starts.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Shared pieces every session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Live-path router.
    pub router: Arc<MessageRouter>,
    /// Server-wide shutdown token.
    pub shutdown: CancellationToken,
    /// Outbound queue size per connection.
    pub outbound_queue_capacity: usize,
    /// Keepalive ping interval.
    pub ping_interval: Duration,
}

/// Why a session left the `Open` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    ReadError,
    /// A frame could not be decoded as a message.
    InvalidFrame,
    /// The connection's termination token fired.
    Terminated,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::ReadError => "read_error",
            Self::InvalidFrame => "invalid_frame",
            Self::Terminated => "terminated",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Run a WebSocket session for a client connected as `identity`.
#[instrument(skip_all, fields(identity = %identity, connection_id))]
pub async fn run_ws_session(ws: WebSocket, identity: Identity, ctx: SessionContext) {
    let (ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Utf8Bytes>(ctx.outbound_queue_capacity.max(1));
    let connection = Arc::new(LiveConnection::new(identity.clone(), send_tx));
    let _ = tracing::Span::current().record("connection_id", connection.id());

    if let Some(previous) = ctx.registry.register(connection.clone()) {
        info!(superseded = previous.id(), "replaced existing connection for identity");
        counter!(WS_CONNECTIONS_REPLACED_TOTAL).increment(1);
    }
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let mut writer = tokio::spawn(run_writer(
        ws_tx,
        send_rx,
        connection.clone(),
        ctx.ping_interval,
    ));

    let reason = receive_loop(&mut ws_rx, &connection, &ctx.router, &ctx.shutdown).await;

    let deregistered = ctx.registry.remove_if_current(&identity, connection.id());
    connection.terminate();
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    drop(ws_rx);

    info!(reason = reason.as_str(), deregistered, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Read frames and route them until the session has to close.
pub async fn receive_loop<S, E>(
    frames: &mut S,
    connection: &LiveConnection,
    router: &MessageRouter,
    shutdown: &CancellationToken,
) -> CloseReason
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            () = connection.terminated() => return CloseReason::Terminated,
            () = shutdown.cancelled() => return CloseReason::Shutdown,
            frame = frames.next() => frame,
        };

        let decoded = match next {
            None | Some(Ok(Message::Close(_))) => return CloseReason::PeerClosed,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read failed");
                return CloseReason::ReadError;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Text(text))) => ChatMessage::from_text(text.as_str()),
            Some(Ok(Message::Binary(data))) => ChatMessage::from_bytes(&data),
        };

        match decoded {
            Ok(message) => {
                if let Err(e) = router.route(&message) {
                    warn!(error = %e, "failed to encode message for delivery");
                }
            }
            Err(e) => {
                warn!(error = %e, "undecodable frame, closing connection");
                return CloseReason::InvalidFrame;
            }
        }
    }
}

/// Drain the outbound queue into the socket and send keepalive pings.
///
/// A failed write terminates the connection. On exit the sink is closed.
pub async fn run_writer<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Utf8Bytes>,
    connection: Arc<LiveConnection>,
    ping_interval: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval(ping_interval);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        let frame = tokio::select! {
            () = connection.terminated() => break,
            frame = outbound.recv() => match frame {
                Some(text) => Message::Text(text),
                None => break,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        if let Err(e) = sink.send(frame).await {
            debug!(error = %e, "websocket write failed");
            connection.terminate();
            break;
        }
    }

    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use futures::stream;

    type Frame = Result<Message, std::io::Error>;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        router: MessageRouter,
        shutdown: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(ConnectionRegistry::new());
            let router = MessageRouter::new(registry.clone());
            Self {
                registry,
                router,
                shutdown: CancellationToken::new(),
            }
        }

        fn connect(&self, identity: &str) -> (Arc<LiveConnection>, mpsc::Receiver<Utf8Bytes>) {
            let (tx, rx) = mpsc::channel(8);
            let conn = Arc::new(LiveConnection::new(Identity::from(identity), tx));
            let _ = self.registry.register(conn.clone());
            (conn, rx)
        }
    }

    fn text(s: &str) -> Frame {
        Ok(Message::Text(s.into()))
    }

    #[tokio::test]
    async fn routes_frames_until_close() {
        let fx = Fixture::new();
        let (alice, mut rx_a) = fx.connect("alice");
        let (_bob, mut rx_b) = fx.connect("bob");

        let mut frames = stream::iter(vec![
            text(r#"{"from":"alice","to":"bob","text":"one"}"#),
            Ok(Message::Ping(Bytes::new())),
            text(r#"{"from":"alice","to":"bob","text":"two"}"#),
            Ok(Message::Close(None)),
            text(r#"{"from":"alice","to":"bob","text":"never"}"#),
        ]);

        let reason = receive_loop(&mut frames, &alice, &fx.router, &fx.shutdown).await;
        assert_eq!(reason, CloseReason::PeerClosed);

        for rx in [&mut rx_a, &mut rx_b] {
            let first = ChatMessage::from_text(rx.try_recv().unwrap().as_str()).unwrap();
            let second = ChatMessage::from_text(rx.try_recv().unwrap().as_str()).unwrap();
            assert_eq!(first.field("text"), Some("one"));
            assert_eq!(second.field("text"), Some("two"));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn end_of_stream_is_peer_closed() {
        let fx = Fixture::new();
        let (alice, _rx) = fx.connect("alice");
        let mut frames = stream::iter(Vec::<Frame>::new());
        let reason = receive_loop(&mut frames, &alice, &fx.router, &fx.shutdown).await;
        assert_eq!(reason, CloseReason::PeerClosed);
    }

    #[tokio::test]
    async fn read_error_closes_session() {
        let fx = Fixture::new();
        let (alice, _rx) = fx.connect("alice");
        let mut frames = stream::iter(vec![Err(std::io::Error::other("reset"))]);
        let reason = receive_loop(&mut frames, &alice, &fx.router, &fx.shutdown).await;
        assert_eq!(reason, CloseReason::ReadError);
    }

    #[tokio::test]
    async fn undecodable_frame_closes_session() {
        let fx = Fixture::new();
        let (alice, _rx) = fx.connect("alice");
        let mut frames = stream::iter(vec![text(r#"{"from":"alice","to":"bob","n":1}"#)]);
        let reason = receive_loop(&mut frames, &alice, &fx.router, &fx.shutdown).await;
        assert_eq!(reason, CloseReason::InvalidFrame);
    }

    #[tokio::test]
    async fn binary_utf8_frame_is_routed() {
        let fx = Fixture::new();
        let (alice, mut rx_a) = fx.connect("alice");
        let mut frames = stream::iter(vec![Ok::<_, std::io::Error>(Message::Binary(
            br#"{"from":"alice","to":"nobody"}"#.to_vec().into(),
        ))]);
        let _ = receive_loop(&mut frames, &alice, &fx.router, &fx.shutdown).await;
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn termination_ends_loop() {
        let fx = Fixture::new();
        let (alice, _rx) = fx.connect("alice");
        alice.terminate();
        let mut frames = stream::pending::<Frame>();
        let reason = receive_loop(&mut frames, &alice, &fx.router, &fx.shutdown).await;
        assert_eq!(reason, CloseReason::Terminated);
    }

    #[tokio::test]
    async fn shutdown_ends_loop() {
        let fx = Fixture::new();
        let (alice, _rx) = fx.connect("alice");
        fx.shutdown.cancel();
        let mut frames = stream::pending::<Frame>();
        let reason = receive_loop(&mut frames, &alice, &fx.router, &fx.shutdown).await;
        assert_eq!(reason, CloseReason::Shutdown);
    }

    #[tokio::test]
    async fn writer_forwards_queued_frames() {
        let (tx, rx) = mpsc::channel(8);
        let connection = Arc::new(LiveConnection::new(Identity::from("alice"), tx));
        let (sink, mut written) = fmpsc::unbounded::<Message>();

        let writer = tokio::spawn(run_writer(
            sink,
            rx,
            connection.clone(),
            Duration::from_secs(3600),
        ));
        let _ = connection.send("hello".into());
        let first = written.next().await.unwrap();
        assert!(matches!(first, Message::Text(ref t) if t.as_str() == "hello"));

        connection.terminate();
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn writer_failure_terminates_connection() {
        let (tx, rx) = mpsc::channel(8);
        let connection = Arc::new(LiveConnection::new(Identity::from("alice"), tx));
        let (sink, written) = fmpsc::unbounded::<Message>();
        drop(written);

        let _ = connection.send("lost".into());
        run_writer(sink, rx, connection.clone(), Duration::from_secs(3600)).await;
        assert!(connection.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn writer_sends_keepalive_pings() {
        let (tx, rx) = mpsc::channel(8);
        let connection = Arc::new(LiveConnection::new(Identity::from("alice"), tx));
        let (sink, mut written) = fmpsc::unbounded::<Message>();

        let writer = tokio::spawn(run_writer(sink, rx, connection.clone(), Duration::from_secs(5)));
        let frame = written.next().await.unwrap();
        assert!(matches!(frame, Message::Ping(_)));

        connection.terminate();
        writer.await.unwrap();
    }
}
