//! Hub state: per-source bounded history and fan-out to attached observers.
//!
//! `Hub` is plain synchronous state. It is owned by exactly one event loop
//! (see [`super::hub_handle`]), which is what serializes every mutation.

use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::{badge_text, Event, ObserverId, SourceId, SourceSummary};

/// Live, named subscription of one observer to one source.
#[derive(Debug)]
pub struct ObserverChannel {
    id: ObserverId,
    name: String,
    tx: mpsc::UnboundedSender<Event>,
}

impl ObserverChannel {
    /// Create a channel and the receiving end the observer reads from.
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Event>) {
        Self::with_id(ObserverId::generate(), name)
    }

    pub fn with_id(
        id: ObserverId,
        name: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id,
                name: name.into(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Push one event; `false` when the observer is gone.
    fn push(&self, event: &Event) -> bool {
        self.tx.send(event.clone()).is_ok()
    }
}

/// One observed page: retained history plus attached observers.
#[derive(Debug, Default)]
struct Source {
    history: VecDeque<Event>,
    observers: Vec<ObserverChannel>,
}

/// Router and history keeper for every source in the process.
#[derive(Debug)]
pub struct Hub {
    max_store: usize,
    sources: HashMap<SourceId, Source>,
    /// observer -> the source it is attached to
    routes: HashMap<ObserverId, SourceId>,
}

impl Hub {
    pub fn new(max_store: usize) -> Self {
        Self {
            max_store: max_store.max(1),
            sources: HashMap::new(),
            routes: HashMap::new(),
        }
    }

    pub fn max_store(&self) -> usize {
        self.max_store
    }

    /// Push the event to every attached observer and append it to the
    /// source's history, evicting the oldest entry past `max_store`.
    /// Observers whose channel is gone are removed. Returns the number of
    /// live deliveries.
    pub fn record_event(&mut self, source_id: SourceId, event: Event) -> usize {
        let max_store = self.max_store;
        let source = self.sources.entry(source_id.clone()).or_default();

        let before = source.observers.len();
        source.observers.retain(|channel| channel.push(&event));
        let delivered = source.observers.len();

        source.history.push_back(event);
        if source.history.len() > max_store {
            source.history.pop_front();
        }

        if delivered < before {
            let live: Vec<ObserverId> = source.observers.iter().map(|c| c.id).collect();
            self.routes
                .retain(|id, routed| routed != &source_id || live.contains(id));
            debug!(source_id = %source_id, removed = before - delivered, "dropped dead observer channels");
        }
        delivered
    }

    /// Register `channel` on the source, then replay the retained history to
    /// it in order. Returns the number of replayed events. An observer id
    /// already attached elsewhere is moved.
    pub fn attach(&mut self, source_id: SourceId, channel: ObserverChannel) -> usize {
        self.detach(channel.id);

        let source = self.sources.entry(source_id.clone()).or_default();
        let mut replayed = 0;
        for event in &source.history {
            if !channel.push(event) {
                debug!(source_id = %source_id, observer_id = %channel.id, "observer gone during replay");
                return replayed;
            }
            replayed += 1;
        }

        info!(
            source_id = %source_id,
            observer_id = %channel.id,
            name = %channel.name,
            replayed,
            "observer attached"
        );
        self.routes.insert(channel.id, source_id);
        source.observers.push(channel);
        replayed
    }

    /// Remove the observer from whichever source it is attached to.
    /// Returns whether anything was removed.
    pub fn detach(&mut self, observer_id: ObserverId) -> bool {
        let Some(source_id) = self.routes.remove(&observer_id) else {
            return false;
        };
        if let Some(source) = self.sources.get_mut(&source_id) {
            source.observers.retain(|c| c.id != observer_id);
        }
        debug!(source_id = %source_id, observer_id = %observer_id, "observer detached");
        true
    }

    /// Forget a source: discard its history and detach its observers.
    /// Returns the number of discarded events, or `None` if unknown.
    pub fn drop_source(&mut self, source_id: &SourceId) -> Option<usize> {
        let source = self.sources.remove(source_id)?;
        for channel in &source.observers {
            self.routes.remove(&channel.id);
        }
        info!(
            source_id = %source_id,
            discarded = source.history.len(),
            detached = source.observers.len(),
            "source dropped"
        );
        Some(source.history.len())
    }

    /// Retained history of a source, oldest first.
    pub fn history(&self, source_id: &SourceId) -> Vec<Event> {
        self.sources
            .get(source_id)
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn observer_count(&self, source_id: &SourceId) -> usize {
        self.sources
            .get(source_id)
            .map(|s| s.observers.len())
            .unwrap_or(0)
    }

    /// Summaries for every known source, ordered by source id.
    pub fn summaries(&self) -> Vec<SourceSummary> {
        let mut out: Vec<SourceSummary> = self
            .sources
            .iter()
            .map(|(id, source)| SourceSummary {
                source_id: id.clone(),
                event_count: source.history.len(),
                observer_count: source.observers.len(),
                badge: badge_text(source.history.len()),
            })
            .collect();
        out.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        out
    }
}
