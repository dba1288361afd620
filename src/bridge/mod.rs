//! Bridge: carries interceptor notices from one frame to the hub.
//!
//! Events are forwarded in arrival order, unmodified except for the frame
//! tag. The hub side may be missing or gone; such events are dropped.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::models::{Event, SourceId};
use crate::relay::Dropped;

/// Downstream of a bridge: accepts events for a source without waiting.
pub trait HubLink: Send + Sync + 'static {
    fn forward(&self, source_id: &SourceId, event: Event) -> Result<(), Dropped>;
}

impl<L: HubLink + ?Sized> HubLink for Arc<L> {
    fn forward(&self, source_id: &SourceId, event: Event) -> Result<(), Dropped> {
        (**self).forward(source_id, event)
    }
}

/// Hub link for a page where observation could not start.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHub;

impl HubLink for NoHub {
    fn forward(&self, _source_id: &SourceId, _event: Event) -> Result<(), Dropped> {
        Err(Dropped)
    }
}

/// Relay for one frame of one source.
pub struct Bridge<L> {
    source_id: SourceId,
    frame: Option<String>,
    link: L,
    dropped: u64,
}

impl<L: HubLink> Bridge<L> {
    /// `frame` identifies the document frame the notices come from; `None`
    /// for pages without nested frames.
    pub fn new(source_id: SourceId, frame: Option<String>, link: L) -> Self {
        Self {
            source_id,
            frame,
            link,
            dropped: 0,
        }
    }

    /// Tag and forward one notice.
    pub fn relay(&mut self, event: Event) {
        let event = match &self.frame {
            Some(frame) if event.origin_frame.is_none() => event.with_origin_frame(frame.clone()),
            _ => event,
        };
        if self.link.forward(&self.source_id, event).is_err() {
            self.dropped += 1;
            trace!(source_id = %self.source_id, dropped = self.dropped, "hub not ready, event dropped");
        }
    }

    /// Events dropped because the hub side was not ready.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Drain notices until the interceptor side goes away.
    pub async fn run(mut self, mut notices: mpsc::UnboundedReceiver<Event>) -> u64 {
        while let Some(event) = notices.recv().await {
            self.relay(event);
        }
        debug!(source_id = %self.source_id, frame = ?self.frame, dropped = self.dropped, "bridge closed");
        self.dropped
    }

    /// Run the bridge on its own task.
    pub fn spawn(self, notices: mpsc::UnboundedReceiver<Event>) -> JoinHandle<u64> {
        tokio::spawn(self.run(notices))
    }
}
