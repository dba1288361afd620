//! Local event cache of one observer with the list and detail renderings.

use serde::Serialize;

use super::filter::{FilterState, KindFilter};
use crate::classifier::{classify, HtmlRenderer, PayloadFormat, PlainRenderer, Renderer};
use crate::models::{Capture, Event};

const PREVIEW_CHARS: usize = 200;

/// Cached events plus the indices visible under the current filter.
#[derive(Debug, Default)]
pub struct ObserverView {
    events: Vec<Event>,
    visible: Vec<usize>,
    filter: FilterState,
}

impl ObserverView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: FilterState) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Cache a delivered event; returns whether it is visible.
    pub fn push(&mut self, event: Event) -> bool {
        let shown = self.filter.matches(&event);
        if shown {
            self.visible.push(self.events.len());
        }
        self.events.push(event);
        shown
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn set_kind_filter(&mut self, kind: KindFilter) {
        self.filter.kind = kind;
        self.refresh();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
        self.refresh();
    }

    fn refresh(&mut self) {
        let filter = &self.filter;
        self.visible = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.matches(e))
            .map(|(i, _)| i)
            .collect();
    }

    /// Empty the local cache. History held by the hub is untouched.
    pub fn clear(&mut self) {
        self.events.clear();
        self.visible.clear();
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Event> {
        self.visible.iter().map(|&i| &self.events[i])
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn total(&self) -> usize {
        self.events.len()
    }

    pub fn status_line(&self) -> String {
        format!("{} / {} messages", self.visible.len(), self.events.len())
    }

    pub fn is_empty_state(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn rows(&self) -> Vec<EventRow> {
        self.visible().map(EventRow::from_event).collect()
    }

    /// Detail of the `n`th visible event.
    pub fn detail(&self, n: usize) -> Option<EventDetail> {
        let index = *self.visible.get(n)?;
        Some(EventDetail::from_event(&self.events[index]))
    }
}

/// Format of a payload-bearing event.
pub fn payload_format(event: &Event) -> Option<PayloadFormat> {
    event.payload().map(|p| classify(p).format())
}

pub fn clock_time(event: &Event) -> String {
    event.timestamp.format("%H:%M:%S%.3f").to_string()
}

pub fn preview(event: &Event) -> String {
    match &event.capture {
        Capture::Connect => event.url.clone(),
        Capture::Close { code, reason } => format!("Code: {} - {}", code, reason),
        Capture::Error => "WebSocket Error".to_string(),
        Capture::Send { payload } | Capture::Receive { payload } => {
            payload.chars().take(PREVIEW_CHARS).collect()
        }
    }
}

/// One line of the event list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRow {
    pub label: &'static str,
    pub time: String,
    pub format: Option<PayloadFormat>,
    pub preview: String,
}

impl EventRow {
    pub fn from_event(event: &Event) -> Self {
        Self {
            label: event.kind().label(),
            time: clock_time(event),
            format: payload_format(event),
            preview: preview(event),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailTab {
    Formatted,
    Raw,
    Meta,
}

/// The three detail tabs of a selected event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetail {
    /// Highlighted markup for display.
    pub formatted_html: String,
    /// Same layout without markup, for copying.
    pub formatted_text: String,
    pub raw: String,
    pub meta: Vec<(&'static str, String)>,
}

impl EventDetail {
    pub fn from_event(event: &Event) -> Self {
        let classified = event.payload().map(classify);
        let (formatted_html, formatted_text) = match &classified {
            Some(c) => (HtmlRenderer.render(c), PlainRenderer.render(c)),
            None => (String::new(), String::new()),
        };
        let raw = event.payload().unwrap_or("(no data)").to_string();
        let size = event.payload().map_or(0, |p| p.chars().count());

        let mut meta = vec![
            ("Direction", event.kind().to_string()),
            ("URL", event.url.clone()),
            (
                "Format",
                classified
                    .as_ref()
                    .map_or("-".to_string(), |c| c.format().to_string()),
            ),
            ("Time", clock_time(event)),
            ("Size", format!("{} chars", size)),
            ("Frame", event.origin_frame.clone().unwrap_or_else(|| "-".into())),
            ("Connection", format!("#{}", event.connection_id)),
        ];
        if let Capture::Close { code, reason } = &event.capture {
            meta.push(("Close Code", code.to_string()));
            meta.push(("Close Reason", reason.clone()));
        }

        Self {
            formatted_html,
            formatted_text,
            raw,
            meta,
        }
    }

    /// Text of one tab; Meta renders as `Key: value` lines.
    pub fn tab(&self, tab: DetailTab) -> String {
        match tab {
            DetailTab::Formatted => self.formatted_html.clone(),
            DetailTab::Raw => self.raw.clone(),
            DetailTab::Meta => self
                .meta
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
