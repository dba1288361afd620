//! Captured socket events and the message models for the observer WebSocket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happened on a socket, with the data only that occurrence carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capture {
    /// Socket constructed.
    Connect,
    /// Outgoing frame; binary frames are replaced by a placeholder.
    Send { payload: String },
    /// Incoming frame; binary frames are replaced by a placeholder.
    Receive { payload: String },
    /// Close as reported by the underlying socket.
    Close {
        code: u16,
        #[serde(default)]
        reason: String,
    },
    /// Socket error. The underlying error object is not carried.
    Error,
}

impl Capture {
    pub fn kind(&self) -> EventKind {
        match self {
            Capture::Connect => EventKind::Connect,
            Capture::Send { .. } => EventKind::Send,
            Capture::Receive { .. } => EventKind::Receive,
            Capture::Close { .. } => EventKind::Close,
            Capture::Error => EventKind::Error,
        }
    }

    /// CLOSE and ERROR end a connection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Capture::Close { .. } | Capture::Error)
    }
}

/// Payload-free discriminant of [`Capture`], used for filtering and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Connect,
    Send,
    Receive,
    Close,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Connect,
        EventKind::Send,
        EventKind::Receive,
        EventKind::Close,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "CONNECT",
            EventKind::Send => "SEND",
            EventKind::Receive => "RECEIVE",
            EventKind::Close => "CLOSE",
            EventKind::Error => "ERROR",
        }
    }

    /// Short direction label shown in event lists.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Connect => "OPEN",
            EventKind::Send => "SEND",
            EventKind::Receive => "RECV",
            EventKind::Close => "CLOSE",
            EventKind::Error => "ERR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// One socket occurrence. Wire names follow what page-side scripts emit
/// (`id`, `type`, `frameUrl`, epoch-millisecond `timestamp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Connection id, unique per execution context, starting at 1.
    #[serde(rename = "id")]
    pub connection_id: u64,
    /// Target URL of the socket.
    pub url: String,
    #[serde(flatten)]
    pub capture: Capture,
    /// Frame that produced the event, set by the bridge.
    #[serde(
        rename = "frameUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_frame: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(connection_id: u64, url: impl Into<String>, capture: Capture) -> Self {
        Self {
            connection_id,
            url: url.into(),
            capture,
            origin_frame: None,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_origin_frame(mut self, frame: impl Into<String>) -> Self {
        self.origin_frame = Some(frame.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.capture.kind()
    }

    pub fn payload(&self) -> Option<&str> {
        match &self.capture {
            Capture::Send { payload } | Capture::Receive { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.capture.is_terminal()
    }
}

/// Observer WebSocket client message: attach / detach / ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    Attach { data: AttachPayload },
    Detach,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachPayload {
    pub source_id: String,
    /// Observer channel name (e.g. `panel`, `popup`).
    #[serde(default)]
    pub name: Option<String>,
}

/// Event pushed to an observer WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureMessage<'a> {
    pub event: &'static str,
    pub channel: &'a str,
    /// Payload classification badge, for payload-bearing events.
    pub format: Option<&'static str>,
    pub data: &'a Event,
}
