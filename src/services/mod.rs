//! Hub services: per-source history, observer fan-out, and the hub event loop.

pub mod hub;
pub mod hub_handle;

pub use hub::{Hub, ObserverChannel};
pub use hub_handle::{HubCommand, HubHandle, Subscription};
