//! Data models for captured events, sources, and observer messages.

pub mod event;
pub mod source;

pub use event::*;
pub use source::*;
