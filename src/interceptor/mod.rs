//! Socket interception: a connector factory that hands out instrumented sockets.
//!
//! # Architecture
//!
//! ```text
//! page code ──connect(url)──▶ InterceptingConnector<C>
//!                                 │ CONNECT notice, then C::connect
//!                                 ▼
//!                          InterceptedSocket<C::Socket>   (implements Socket)
//!                                 │ SEND / RECEIVE / CLOSE / ERROR notices
//!                                 ▼
//!                          BestEffortChannel<Event> ──▶ Bridge
//! ```
//!
//! The wrapper implements the same [`Socket`] capability as the socket it
//! wraps, so page code cannot tell whether it is being observed. Notices are
//! fire-and-forget: a missing listener drops them and never changes what the
//! real socket does.

pub mod client;

pub use client::{TungsteniteConnector, TungsteniteSocket};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::models::{Capture, Event};
use crate::relay::BestEffortChannel;

/// Close code reported when a stream ends without a close frame, or the
/// socket is dropped without being closed.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when a close carries no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// One WebSocket data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Payload text for a notice. Binary frames become a size placeholder.
    pub fn describe(&self) -> String {
        match self {
            Frame::Text(text) => text.clone(),
            Frame::Binary(bytes) => binary_placeholder(bytes.len()),
        }
    }
}

pub fn binary_placeholder(len: usize) -> String {
    format!("[Binary] length={}", len)
}

/// Something the socket reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(Frame),
    Closed { code: u16, reason: String },
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("close failed: {0}")]
    Close(String),
}

/// The socket capability page code programs against.
#[async_trait]
pub trait Socket: Send {
    /// Target URL the socket was constructed with.
    fn url(&self) -> &str;

    async fn send(&mut self, frame: Frame) -> Result<(), SocketError>;

    /// Next inbound occurrence; `None` once the stream has ended.
    async fn recv(&mut self) -> Option<SocketEvent>;

    async fn close(&mut self, code: Option<u16>, reason: Option<String>)
        -> Result<(), SocketError>;
}

/// Socket factory: the "constructor" the page calls.
#[async_trait]
pub trait Connector: Send + Sync {
    type Socket: Socket;

    async fn connect(&self, url: &str) -> Result<Self::Socket, SocketError>;
}

/// Connector decorator that instruments every socket it creates.
pub struct InterceptingConnector<C> {
    inner: C,
    next_id: AtomicU64,
    notices: BestEffortChannel<Event>,
}

impl<C: Connector> InterceptingConnector<C> {
    pub fn new(inner: C, notices: BestEffortChannel<Event>) -> Self {
        Self {
            inner,
            next_id: AtomicU64::new(0),
            notices,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Connector> Connector for InterceptingConnector<C> {
    type Socket = InterceptedSocket<C::Socket>;

    async fn connect(&self, url: &str) -> Result<Self::Socket, SocketError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut emitter = Emitter::new(id, url, self.notices.clone());
        emitter.emit(Capture::Connect);

        match self.inner.connect(url).await {
            Ok(inner) => Ok(InterceptedSocket {
                inner,
                emitter,
                close_requested: None,
            }),
            Err(e) => {
                debug!(connection_id = id, url = %url, error = %e, "intercepted connect failed");
                emitter.emit(Capture::Error);
                Err(e)
            }
        }
    }
}

/// Per-connection notice emitter. Enforces the lifecycle order and
/// non-decreasing timestamps.
struct Emitter {
    connection_id: u64,
    url: String,
    notices: BestEffortChannel<Event>,
    last_timestamp: DateTime<Utc>,
    terminated: bool,
}

impl Emitter {
    fn new(connection_id: u64, url: &str, notices: BestEffortChannel<Event>) -> Self {
        Self {
            connection_id,
            url: url.to_string(),
            notices,
            last_timestamp: DateTime::<Utc>::MIN_UTC,
            terminated: false,
        }
    }

    fn emit(&mut self, capture: Capture) {
        if self.terminated {
            return;
        }
        self.terminated = capture.is_terminal();
        let timestamp = Utc::now().max(self.last_timestamp);
        self.last_timestamp = timestamp;
        let event = Event::new(self.connection_id, self.url.clone(), capture).at(timestamp);
        let _ = self.notices.send(event);
    }
}

/// A socket whose lifecycle is reported to the bridge. Every call is
/// forwarded to the wrapped socket unchanged.
///
/// A connection always ends with a terminal notice: if the owner drops the
/// socket before the peer's close was read, CLOSE is reported on drop with
/// the code the owner asked for, or 1006 if it never closed.
pub struct InterceptedSocket<S> {
    inner: S,
    emitter: Emitter,
    close_requested: Option<(u16, String)>,
}

impl<S> InterceptedSocket<S> {
    pub fn connection_id(&self) -> u64 {
        self.emitter.connection_id
    }
}

impl<S> Drop for InterceptedSocket<S> {
    fn drop(&mut self) {
        let (code, reason) = self
            .close_requested
            .take()
            .unwrap_or((ABNORMAL_CLOSURE, String::new()));
        self.emitter.emit(Capture::Close { code, reason });
    }
}

#[async_trait]
impl<S: Socket> Socket for InterceptedSocket<S> {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn send(&mut self, frame: Frame) -> Result<(), SocketError> {
        self.emitter.emit(Capture::Send {
            payload: frame.describe(),
        });
        self.inner.send(frame).await
    }

    async fn recv(&mut self) -> Option<SocketEvent> {
        let event = self.inner.recv().await;
        let capture = match &event {
            Some(SocketEvent::Message(frame)) => Capture::Receive {
                payload: frame.describe(),
            },
            Some(SocketEvent::Closed { code, reason }) => Capture::Close {
                code: *code,
                reason: reason.clone(),
            },
            Some(SocketEvent::Error(_)) => Capture::Error,
            None => Capture::Close {
                code: ABNORMAL_CLOSURE,
                reason: String::new(),
            },
        };
        self.emitter.emit(capture);
        event
    }

    async fn close(
        &mut self,
        code: Option<u16>,
        reason: Option<String>,
    ) -> Result<(), SocketError> {
        self.close_requested = Some((
            code.unwrap_or(NO_STATUS_RECEIVED),
            reason.clone().unwrap_or_default(),
        ));
        self.inner.close(code, reason).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedConnector;
    use super::*;
    use crate::models::EventKind;
    use crate::relay::best_effort;
    use tokio::sync::mpsc;

    fn kinds(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.kind());
        }
        out
    }

    #[tokio::test]
    async fn connect_is_announced_before_the_socket_is_returned() {
        let (notices, mut rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(vec![]), notices);
        let socket = connector.connect("ws://a.test/feed").await.unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind(), EventKind::Connect);
        assert_eq!(event.connection_id, socket.connection_id());
        assert_eq!(event.url, "ws://a.test/feed");
    }

    #[tokio::test]
    async fn connection_ids_start_at_one_and_increase() {
        let (notices, _rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(vec![]), notices);
        let a = connector.connect("ws://a").await.unwrap();
        let b = connector.connect("ws://b").await.unwrap();
        assert_eq!(a.connection_id(), 1);
        assert_eq!(b.connection_id(), 2);
    }

    #[tokio::test]
    async fn lifecycle_order_and_nothing_after_close() {
        let script = vec![
            SocketEvent::Message(Frame::Text("hello".into())),
            SocketEvent::Message(Frame::Binary(vec![0; 16])),
            SocketEvent::Closed {
                code: 1000,
                reason: "done".into(),
            },
        ];
        let (notices, mut rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(script), notices);
        let mut socket = connector.connect("ws://a").await.unwrap();

        socket.send(Frame::Text("ping".into())).await.unwrap();
        while socket.recv().await.is_some() {}
        socket.send(Frame::Text("late".into())).await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let got: Vec<EventKind> = events.iter().map(Event::kind).collect();
        assert_eq!(
            got,
            vec![
                EventKind::Connect,
                EventKind::Send,
                EventKind::Receive,
                EventKind::Receive,
                EventKind::Close,
            ]
        );
        assert_eq!(events[3].payload(), Some("[Binary] length=16"));
        assert_eq!(
            events[4].capture,
            Capture::Close {
                code: 1000,
                reason: "done".into()
            }
        );
        assert!(events
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn sends_are_forwarded_unmodified() {
        let (notices, _rx) = best_effort();
        let inner = ScriptedConnector::new(vec![]);
        let sent = inner.sent.clone();
        let connector = InterceptingConnector::new(inner, notices);
        let mut socket = connector.connect("ws://a").await.unwrap();
        socket.send(Frame::Binary(vec![1, 2, 3])).await.unwrap();
        assert_eq!(*sent.lock().unwrap(), vec![Frame::Binary(vec![1, 2, 3])]);
    }

    #[tokio::test]
    async fn stream_end_without_close_frame_reports_abnormal_closure() {
        let (notices, mut rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(vec![]), notices);
        let mut socket = connector.connect("ws://a").await.unwrap();
        assert!(socket.recv().await.is_none());
        assert!(socket.recv().await.is_none());
        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].capture,
            Capture::Close {
                code: ABNORMAL_CLOSURE,
                reason: String::new()
            }
        );
    }

    #[tokio::test]
    async fn closing_then_dropping_reports_the_requested_close() {
        let (notices, mut rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(vec![]), notices);
        let mut socket = connector.connect("ws://a").await.unwrap();
        socket.close(Some(4000), Some("bye".into())).await.unwrap();
        assert_eq!(kinds(&mut rx), vec![EventKind::Connect]);

        drop(socket);
        let event = rx.try_recv().unwrap();
        assert_eq!(
            event.capture,
            Capture::Close {
                code: 4000,
                reason: "bye".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_an_open_socket_reports_abnormal_closure() {
        let (notices, mut rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(vec![]), notices);
        let socket = connector.connect("ws://a").await.unwrap();
        drop(socket);
        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].capture,
            Capture::Close {
                code: ABNORMAL_CLOSURE,
                reason: String::new()
            }
        );
    }

    #[tokio::test]
    async fn drop_after_peer_close_adds_nothing() {
        let script = vec![SocketEvent::Closed {
            code: 1000,
            reason: String::new(),
        }];
        let (notices, mut rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(script), notices);
        let mut socket = connector.connect("ws://a").await.unwrap();
        socket.close(Some(1000), None).await.unwrap();
        socket.recv().await;
        drop(socket);
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::Connect, EventKind::Close]
        );
    }

    #[tokio::test]
    async fn error_is_terminal() {
        let script = vec![
            SocketEvent::Error("reset".into()),
            SocketEvent::Message(Frame::Text("ghost".into())),
        ];
        let (notices, mut rx) = best_effort();
        let connector = InterceptingConnector::new(ScriptedConnector::new(script), notices);
        let mut socket = connector.connect("ws://a").await.unwrap();
        while socket.recv().await.is_some() {}
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::Connect, EventKind::Error]
        );
    }

    #[tokio::test]
    async fn refused_connect_reports_error_and_returns_the_original_error() {
        let (notices, mut rx) = best_effort();
        let mut inner = ScriptedConnector::new(vec![]);
        inner.refuse = true;
        let connector = InterceptingConnector::new(inner, notices);
        let err = connector.connect("ws://down").await.err().unwrap();
        assert!(matches!(err, SocketError::Connect(_)));
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::Connect, EventKind::Error]
        );
    }

    #[tokio::test]
    async fn missing_listener_never_affects_the_socket() {
        let inner = ScriptedConnector::new(vec![SocketEvent::Message(Frame::Text("x".into()))]);
        let sent = inner.sent.clone();
        let connector = InterceptingConnector::new(inner, BestEffortChannel::disconnected());
        let mut socket = connector.connect("ws://a").await.unwrap();
        socket.send(Frame::Text("y".into())).await.unwrap();
        assert_eq!(
            socket.recv().await,
            Some(SocketEvent::Message(Frame::Text("x".into())))
        );
        assert_eq!(sent.lock().unwrap().len(), 1);
    }
}
