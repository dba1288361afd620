//! HTTP handlers: event ingest, source views, source drop and health.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::bridge::Bridge;
use crate::error::{AppError, AppResult};
use crate::models::{Event, SourceId};
use crate::observer::view::payload_format;
use crate::observer::{EventRow, FilterState, ObserverView};
use crate::services::HubHandle;

/// Shared application state for HTTP and WS handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub max_store: usize,
}

impl AppState {
    pub fn new(hub: HubHandle, max_store: usize) -> Self {
        Self { hub, max_store }
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }
}

const HEADER_ORIGIN_FRAME: &str = "x-origin-frame";

/// Ingest body: a single event or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IngestBody {
    Many(Vec<Event>),
    One(Event),
}

impl IngestBody {
    fn into_events(self) -> Vec<Event> {
        match self {
            IngestBody::Many(events) => events,
            IngestBody::One(event) => vec![event],
        }
    }
}

/// POST /api/sources/:source_id/events: record events captured in a page.
/// Optional header: x-origin-frame: <frame url> for events without `frameUrl`.
pub async fn ingest_events(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let events = serde_json::from_value::<IngestBody>(body)?.into_events();
    if let Some(bad) = events.iter().find(|e| e.connection_id == 0) {
        return Err(AppError::Validation(format!(
            "connection id must be at least 1 (event for {})",
            bad.url
        )));
    }

    let frame = headers
        .get(HEADER_ORIGIN_FRAME)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let source_id = SourceId::from(source_id);
    let total = events.len();

    let mut bridge = Bridge::new(source_id.clone(), frame, state.hub.clone());
    for event in events {
        bridge.relay(event);
    }
    if bridge.dropped() > 0 {
        return Err(AppError::HubUnavailable);
    }

    debug!(source_id = %source_id, recorded = total, "events ingested");
    Ok(Json(json!({
        "ok": true,
        "source_id": source_id,
        "recorded": total
    })))
}

/// GET /api/sources: every known source with counts and badge text.
pub async fn list_sources(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let sources = state.hub.summaries().await?;
    Ok(Json(json!({ "sources": sources })))
}

/// GET /api/sources/:source_id/events?kind=&search=: filtered history.
pub async fn source_events(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
    Query(filter): Query<FilterState>,
) -> AppResult<Json<Value>> {
    let source_id = SourceId::from(source_id);
    let history = state.hub.snapshot(source_id.clone()).await?;

    let mut view = ObserverView::with_filter(filter);
    for event in history {
        view.push(event);
    }
    let events: Vec<Value> = view
        .visible()
        .map(|event| {
            json!({
                "format": payload_format(event),
                "row": EventRow::from_event(event),
                "data": event
            })
        })
        .collect();

    Ok(Json(json!({
        "source_id": source_id,
        "status": view.status_line(),
        "visible": view.visible_count(),
        "total": view.total(),
        "events": events
    })))
}

/// DELETE /api/sources/:source_id: the page navigated away or closed.
pub async fn drop_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> AppResult<Json<Value>> {
    let source_id = SourceId::from(source_id);
    let discarded = state.hub.drop_source(source_id.clone()).await?;
    if let Some(n) = discarded {
        info!(source_id = %source_id, discarded = n, "source dropped over http");
    }
    Ok(Json(json!({
        "ok": true,
        "source_id": source_id,
        "known": discarded.is_some(),
        "discarded": discarded.unwrap_or(0)
    })))
}

/// GET /health: liveness check.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "ws-sniffer",
            "max_store": state.max_store
        })),
    )
}
