//! In-process observer: a hub subscription feeding a local view.

pub mod filter;
pub mod view;

pub use filter::{FilterState, KindFilter};
pub use view::{DetailTab, EventDetail, EventRow, ObserverView};

use tracing::debug;

use crate::models::{Event, SourceId};
use crate::services::{HubHandle, Subscription};

/// A named consumer (`panel`, `popup`, ...) attached to at most one source.
pub struct Observer {
    hub: HubHandle,
    name: String,
    subscription: Option<Subscription>,
    view: ObserverView,
}

impl Observer {
    pub fn new(hub: HubHandle, name: impl Into<String>) -> Self {
        Self {
            hub,
            name: name.into(),
            subscription: None,
            view: ObserverView::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach to `source_id`, replacing any previous attachment. The local
    /// cache is cleared since the hub replays the retained history.
    pub fn attach(&mut self, source_id: SourceId) {
        self.detach();
        self.view.clear();
        debug!(source_id = %source_id, name = %self.name, "observer attaching");
        self.subscription = Some(self.hub.attach(source_id, self.name.clone()));
    }

    pub fn source_id(&self) -> Option<&SourceId> {
        self.subscription.as_ref().map(Subscription::source_id)
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Wait for the next delivered event and cache it. `None` when not
    /// attached or once the hub ends the stream (source dropped).
    pub async fn next(&mut self) -> Option<&Event> {
        let subscription = self.subscription.as_mut()?;
        match subscription.recv().await {
            Some(event) => {
                self.view.push(event);
                self.view.last()
            }
            None => {
                self.subscription = None;
                None
            }
        }
    }

    /// Cache everything already delivered without waiting. Returns the
    /// number of events taken.
    pub fn drain(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };
        let mut taken = 0;
        while let Some(event) = subscription.try_recv() {
            self.view.push(event);
            taken += 1;
        }
        taken
    }

    /// Stop receiving. The local cache is kept.
    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.hub.detach(subscription.observer_id());
        }
    }

    pub fn view(&self) -> &ObserverView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ObserverView {
        &mut self.view
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.hub.detach(subscription.observer_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capture, EventKind};
    use crate::services::Hub;

    fn recv(payload: &str) -> Event {
        Event::new(
            1,
            "ws://a",
            Capture::Receive {
                payload: payload.into(),
            },
        )
    }

    #[tokio::test]
    async fn attach_replays_then_follows_live() {
        let hub = HubHandle::spawn(Hub::new(500));
        let tab = SourceId::from("tab");
        hub.record(tab.clone(), Event::new(1, "ws://a", Capture::Connect))
            .unwrap();

        let mut panel = Observer::new(hub.clone(), "panel");
        panel.attach(tab.clone());
        hub.record(tab.clone(), recv("live")).unwrap();

        assert_eq!(panel.next().await.unwrap().kind(), EventKind::Connect);
        assert_eq!(panel.next().await.unwrap().payload(), Some("live"));
        assert_eq!(panel.view().status_line(), "2 / 2 messages");
        assert_eq!(panel.source_id(), Some(&tab));
    }

    #[tokio::test]
    async fn detached_observer_stops_while_others_continue() {
        let hub = HubHandle::spawn(Hub::new(500));
        let tab = SourceId::from("tab");
        let mut panel = Observer::new(hub.clone(), "panel");
        let mut popup = Observer::new(hub.clone(), "popup");
        panel.attach(tab.clone());
        popup.attach(tab.clone());

        hub.record(tab.clone(), recv("a")).unwrap();
        assert_eq!(popup.next().await.unwrap().payload(), Some("a"));
        popup.detach();
        assert!(!popup.is_attached());
        hub.record(tab.clone(), recv("b")).unwrap();

        // round trip through the hub so both records have been fanned out
        assert_eq!(hub.snapshot(tab.clone()).await.unwrap().len(), 2);
        assert_eq!(panel.drain(), 2);
        assert_eq!(panel.view().total(), 2);
        assert!(popup.next().await.is_none());
        assert_eq!(popup.drain(), 0);
    }

    #[tokio::test]
    async fn dropped_source_ends_the_stream() {
        let hub = HubHandle::spawn(Hub::new(500));
        let tab = SourceId::from("tab");
        let mut panel = Observer::new(hub.clone(), "panel");
        panel.attach(tab.clone());
        hub.record(tab.clone(), recv("x")).unwrap();
        hub.drop_source(tab.clone()).await.unwrap();

        assert!(panel.next().await.is_some());
        assert!(panel.next().await.is_none());
        assert!(!panel.is_attached());
        assert_eq!(panel.view().total(), 1);
    }

    #[tokio::test]
    async fn reattach_replays_current_history_only() {
        let hub = HubHandle::spawn(Hub::new(2));
        let tab = SourceId::from("tab");
        for p in ["1", "2", "3"] {
            hub.record(tab.clone(), recv(p)).unwrap();
        }
        let mut panel = Observer::new(hub.clone(), "panel");
        panel.attach(tab.clone());
        assert_eq!(hub.snapshot(tab.clone()).await.unwrap().len(), 2);
        assert_eq!(panel.drain(), 2);

        panel.attach(tab.clone());
        assert_eq!(hub.snapshot(tab.clone()).await.unwrap().len(), 2);
        assert_eq!(panel.drain(), 2);
        let payloads: Vec<_> = panel.view().events().iter().filter_map(Event::payload).collect();
        assert_eq!(payloads, vec!["2", "3"]);
    }
}
