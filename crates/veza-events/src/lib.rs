#![forbid(unsafe_code)]

//! Unified event bus for the veza connection pipeline.

mod bus;
mod connection;
mod event;
mod quality;

pub use bus::EventBus;
pub use connection::ConnectionEvent;
pub use event::Event;
pub use quality::QualityEvent;
