//! Hub event loop and the cloneable handle used to talk to it.
//!
//! One task owns the [`Hub`] and applies [`HubCommand`]s in arrival order.
//! That single consumer is what orders every mutation: a `record` queued
//! before an `attach` is part of that observer's replay, one queued after is
//! delivered live.
//!
//! Commands that change state are fire-and-forget. Queries reply over a
//! oneshot and fail with [`AppError::HubUnavailable`] once the loop is gone.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::hub::{Hub, ObserverChannel};
use crate::bridge::HubLink;
use crate::error::{AppError, AppResult};
use crate::models::{Event, ObserverId, SourceId, SourceSummary};
use crate::relay::Dropped;

/// Messages accepted by the hub event loop.
#[derive(Debug)]
pub enum HubCommand {
    Record {
        source_id: SourceId,
        event: Event,
    },
    Attach {
        source_id: SourceId,
        channel: ObserverChannel,
    },
    Detach {
        observer_id: ObserverId,
    },
    DropSource {
        source_id: SourceId,
        response_tx: oneshot::Sender<Option<usize>>,
    },
    Summaries {
        response_tx: oneshot::Sender<Vec<SourceSummary>>,
    },
    Snapshot {
        source_id: SourceId,
        response_tx: oneshot::Sender<Vec<Event>>,
    },
}

/// Handle to the hub event loop. `Clone + Send + Sync`.
#[derive(Debug, Clone)]
pub struct HubHandle {
    command_tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Start the event loop for `hub` on the current runtime.
    pub fn spawn(hub: Hub) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(hub, command_rx));
        Self { command_tx }
    }

    /// Handle whose event loop never started. Commands are dropped and
    /// queries fail.
    pub fn unavailable() -> Self {
        let (command_tx, _command_rx) = mpsc::unbounded_channel();
        Self { command_tx }
    }

    fn submit(&self, command: HubCommand) -> Result<(), Dropped> {
        self.command_tx.send(command).map_err(|_| Dropped)
    }

    pub fn record(&self, source_id: SourceId, event: Event) -> Result<(), Dropped> {
        self.submit(HubCommand::Record { source_id, event })
    }

    /// Attach a new observer channel named `name` to the source. Replay and
    /// live events arrive on the returned subscription. If the hub is gone
    /// the subscription simply ends.
    pub fn attach(&self, source_id: SourceId, name: impl Into<String>) -> Subscription {
        self.attach_as(ObserverId::generate(), source_id, name)
    }

    /// Like [`attach`](Self::attach) with a caller-chosen observer id. An id
    /// that is already attached is moved to the new source.
    pub fn attach_as(
        &self,
        observer_id: ObserverId,
        source_id: SourceId,
        name: impl Into<String>,
    ) -> Subscription {
        let (channel, rx) = ObserverChannel::with_id(observer_id, name);
        let _ = self.submit(HubCommand::Attach {
            source_id: source_id.clone(),
            channel,
        });
        Subscription {
            observer_id,
            source_id,
            rx,
        }
    }

    pub fn detach(&self, observer_id: ObserverId) {
        let _ = self.submit(HubCommand::Detach { observer_id });
    }

    /// Forget a source; returns the number of discarded events, or `None`
    /// when the source was unknown.
    pub async fn drop_source(&self, source_id: SourceId) -> AppResult<Option<usize>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.submit(HubCommand::DropSource {
            source_id,
            response_tx,
        })
        .map_err(|_| AppError::HubUnavailable)?;
        response_rx.await.map_err(|_| AppError::HubUnavailable)
    }

    pub async fn summaries(&self) -> AppResult<Vec<SourceSummary>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.submit(HubCommand::Summaries { response_tx })
            .map_err(|_| AppError::HubUnavailable)?;
        response_rx.await.map_err(|_| AppError::HubUnavailable)
    }

    /// Copy of a source's retained history, oldest first.
    pub async fn snapshot(&self, source_id: SourceId) -> AppResult<Vec<Event>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.submit(HubCommand::Snapshot {
            source_id,
            response_tx,
        })
        .map_err(|_| AppError::HubUnavailable)?;
        response_rx.await.map_err(|_| AppError::HubUnavailable)
    }
}

impl HubLink for HubHandle {
    fn forward(&self, source_id: &SourceId, event: Event) -> Result<(), Dropped> {
        self.record(source_id.clone(), event)
    }
}

/// Receiving side of one observer channel.
#[derive(Debug)]
pub struct Subscription {
    observer_id: ObserverId,
    source_id: SourceId,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    pub fn observer_id(&self) -> ObserverId {
        self.observer_id
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Next delivered event; `None` once the hub has released the channel
    /// (detached, source dropped, or hub gone).
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// An already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

async fn run(mut hub: Hub, mut command_rx: mpsc::UnboundedReceiver<HubCommand>) {
    info!(max_store = hub.max_store(), "hub started");
    while let Some(command) = command_rx.recv().await {
        match command {
            HubCommand::Record { source_id, event } => {
                let delivered = hub.record_event(source_id, event);
                debug!(delivered, "event recorded");
            }
            HubCommand::Attach { source_id, channel } => {
                hub.attach(source_id, channel);
            }
            HubCommand::Detach { observer_id } => {
                hub.detach(observer_id);
            }
            HubCommand::DropSource {
                source_id,
                response_tx,
            } => {
                let _ = response_tx.send(hub.drop_source(&source_id));
            }
            HubCommand::Summaries { response_tx } => {
                let _ = response_tx.send(hub.summaries());
            }
            HubCommand::Snapshot {
                source_id,
                response_tx,
            } => {
                let _ = response_tx.send(hub.history(&source_id));
            }
        }
    }
    info!("hub stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capture, EventKind};
    use tokio_test::{assert_pending, assert_ready, task};

    fn send(payload: &str) -> Event {
        Event::new(
            1,
            "ws://a",
            Capture::Send {
                payload: payload.into(),
            },
        )
    }

    #[tokio::test]
    async fn attach_after_n_then_live() {
        let hub = HubHandle::spawn(Hub::new(500));
        let tab = SourceId::from("tab");
        hub.record(tab.clone(), Event::new(1, "ws://a", Capture::Connect))
            .unwrap();
        hub.record(tab.clone(), send("one")).unwrap();

        let mut sub = hub.attach(tab.clone(), "panel");
        hub.record(tab.clone(), send("two")).unwrap();

        assert_eq!(sub.recv().await.unwrap().kind(), EventKind::Connect);
        assert_eq!(sub.recv().await.unwrap().payload(), Some("one"));
        assert_eq!(sub.recv().await.unwrap().payload(), Some("two"));

        let summaries = hub.summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].event_count, 3);
        assert_eq!(summaries[0].observer_count, 1);
    }

    #[tokio::test]
    async fn subscription_waits_for_live_events() {
        let hub = HubHandle::spawn(Hub::new(10));
        let tab = SourceId::from("tab");
        let mut sub = hub.attach(tab.clone(), "popup");
        // let the loop register the channel
        assert!(hub.snapshot(tab.clone()).await.unwrap().is_empty());

        {
            let mut next = task::spawn(sub.recv());
            assert_pending!(next.poll());
        }
        hub.record(tab.clone(), send("late")).unwrap();
        assert_eq!(hub.snapshot(tab.clone()).await.unwrap().len(), 1);
        let mut next = task::spawn(sub.recv());
        let event = assert_ready!(next.poll()).unwrap();
        assert_eq!(event.payload(), Some("late"));
    }

    #[tokio::test]
    async fn drop_source_ends_subscriptions_and_clears_history() {
        let hub = HubHandle::spawn(Hub::new(10));
        let tab = SourceId::from("tab");
        hub.record(tab.clone(), send("x")).unwrap();
        let mut sub = hub.attach(tab.clone(), "panel");

        assert_eq!(hub.drop_source(tab.clone()).await.unwrap(), Some(1));
        assert_eq!(sub.recv().await.unwrap().payload(), Some("x"));
        assert!(sub.recv().await.is_none());

        let mut again = hub.attach(tab.clone(), "panel");
        assert!(hub.snapshot(tab.clone()).await.unwrap().is_empty());
        assert!(again.try_recv().is_none());
        assert_eq!(hub.drop_source(SourceId::from("nope")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unavailable_hub_fails_queries_and_drops_records() {
        let hub = HubHandle::unavailable();
        assert_eq!(hub.record(SourceId::from("t"), send("x")), Err(Dropped));
        assert!(matches!(
            hub.summaries().await,
            Err(AppError::HubUnavailable)
        ));
        let mut sub = hub.attach(SourceId::from("t"), "panel");
        assert!(sub.recv().await.is_none());
    }
}
