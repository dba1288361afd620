//! Observer WebSocket: attach, detach, ping, and forwarding of captured events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::handlers::http::AppState;
use crate::models::{CaptureMessage, ClientMessage, Event, ObserverId, SourceId};
use crate::observer::view::payload_format;

const DEFAULT_OBSERVER_NAME: &str = "observer";

/// Optional attach-on-connect parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ObserveParams {
    pub source: Option<String>,
    pub name: Option<String>,
}

/// GET /ws/observe: upgrade to the observer protocol.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ObserveParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket, params))
}

async fn handle_socket(state: AppState, socket: WebSocket, params: ObserveParams) {
    let observer_id = ObserverId::generate();
    info!(observer_id = %observer_id, "observer connected");

    let (mut sender, mut receiver) = socket.split();

    let conn_msg = json!({
        "event": "connection_established",
        "data": { "observer_id": observer_id }
    });
    if sender.send(Message::Text(conn_msg.to_string())).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let mut forward: Option<JoinHandle<()>> = None;
    if let Some(source) = params.source.filter(|s| !s.is_empty()) {
        let name = params.name.unwrap_or_else(|| DEFAULT_OBSERVER_NAME.to_string());
        forward = Some(attach(&state, &tx, observer_id, SourceId::from(source), name));
    }

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Attach { data }) => {
                    if data.source_id.is_empty() {
                        let _ = tx.send(error_message("source_id must not be empty"));
                        continue;
                    }
                    if let Some(task) = forward.take() {
                        task.abort();
                    }
                    let name = data
                        .name
                        .unwrap_or_else(|| DEFAULT_OBSERVER_NAME.to_string());
                    forward = Some(attach(
                        &state,
                        &tx,
                        observer_id,
                        SourceId::from(data.source_id),
                        name,
                    ));
                }
                Ok(ClientMessage::Detach) => {
                    if let Some(task) = forward.take() {
                        task.abort();
                        state.hub.detach(observer_id);
                        debug!(observer_id = %observer_id, "observer detached");
                    }
                }
                Ok(ClientMessage::Ping) => {
                    let _ = tx.send(json!({ "event": "pong" }).to_string());
                }
                Err(e) => {
                    debug!(observer_id = %observer_id, error = %e, "unparseable observer message");
                    let _ = tx.send(error_message(&format!("Invalid message: {}", e)));
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(task) = forward.take() {
        task.abort();
    }
    state.hub.detach(observer_id);
    send_task.abort();
    info!(observer_id = %observer_id, "observer disconnected");
}

/// Attach `observer_id` to the source and spawn the task forwarding its
/// deliveries to the socket writer.
fn attach(
    state: &AppState,
    tx: &mpsc::UnboundedSender<String>,
    observer_id: ObserverId,
    source_id: SourceId,
    name: String,
) -> JoinHandle<()> {
    let mut subscription = state.hub.attach_as(observer_id, source_id.clone(), name);
    let attached = json!({ "event": "attached", "channel": source_id });
    let _ = tx.send(attached.to_string());

    let tx = tx.clone();
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match capture_message(&source_id, &event) {
                Ok(text) => {
                    if tx.send(text).is_err() {
                        return;
                    }
                }
                Err(e) => warn!(source_id = %source_id, error = %e, "capture not serializable"),
            }
        }
        let detached = json!({ "event": "source_detached", "channel": source_id });
        let _ = tx.send(detached.to_string());
    })
}

pub(crate) fn capture_message(
    source_id: &SourceId,
    event: &Event,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CaptureMessage {
        event: "capture",
        channel: source_id.as_ref(),
        format: payload_format(event).map(|f| f.as_str()),
        data: event,
    })
}

fn error_message(message: &str) -> String {
    json!({ "event": "error", "data": { "message": message } }).to_string()
}
