//! Best-effort one-way channel used between page-side contexts.
//!
//! A send either hands the item to a live peer or drops it. Failure never
//! propagates to the caller beyond a `Dropped` marker that callers discard.

use tokio::sync::mpsc;
use tracing::trace;

/// The item was dropped because no peer was listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("peer not ready, item dropped")]
pub struct Dropped;

/// Sending half of a fire-and-forget channel.
#[derive(Debug)]
pub struct BestEffortChannel<T> {
    tx: Option<mpsc::UnboundedSender<T>>,
}

impl<T> Clone for BestEffortChannel<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Create a connected channel and its receiving half.
pub fn best_effort<T>() -> (BestEffortChannel<T>, mpsc::UnboundedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BestEffortChannel { tx: Some(tx) }, rx)
}

impl<T> BestEffortChannel<T> {
    /// A channel whose peer never became ready; every send is dropped.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Hand `item` to the peer without waiting.
    pub fn send(&self, item: T) -> Result<(), Dropped> {
        match &self.tx {
            Some(tx) if tx.send(item).is_ok() => Ok(()),
            _ => {
                trace!("best-effort send dropped");
                Err(Dropped)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_order_while_peer_is_alive() {
        let (tx, mut rx) = best_effort();
        assert!(tx.send(1).is_ok());
        assert!(tx.send(2).is_ok());
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
    }

    #[test]
    fn drops_after_peer_is_gone() {
        let (tx, rx) = best_effort::<u8>();
        drop(rx);
        assert!(!tx.is_connected());
        assert_eq!(tx.send(7), Err(Dropped));
    }

    #[test]
    fn disconnected_drops_everything() {
        let tx = BestEffortChannel::<&str>::disconnected();
        assert!(!tx.is_connected());
        assert_eq!(tx.send("x"), Err(Dropped));
    }
}
