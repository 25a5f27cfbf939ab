#![forbid(unsafe_code)]

//! # veza
//!
//! Facade crate wiring the quality loop and the resilience controller for one
//! real-time connection.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use veza::prelude::*;
//!
//! let transport: Arc<dyn PeerTransport> = connect_somehow();
//! let mut monitor = Monitor::new(transport, MonitorConfig::default());
//!
//! let _handle = monitor.observe(|score, snapshot| {
//!     println!("{:?} at {} bps", score.level, snapshot.current_bitrate_bps);
//! });
//! monitor.start();
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod abr {
    pub use veza_abr::*;
}

pub mod events {
    pub use veza_events::*;
}

pub mod quality {
    pub use veza_quality::*;
}

pub mod resilience {
    pub use veza_resilience::*;
}

pub mod transport {
    pub use veza_transport::*;
}

// ── Monitor ─────────────────────────────────────────────────────────────

mod config;
mod monitor;
mod observers;
mod quality_loop;

pub use config::MonitorConfig;
pub use monitor::Monitor;
pub use observers::ObserverHandle;
pub use quality_loop::QualityLoop;

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use veza_abr::BitrateEnvelope;
    pub use veza_events::{ConnectionEvent, Event, QualityEvent};
    pub use veza_quality::{AdaptationConfig, MetricsSnapshot, QualityLevel, QualityScore};
    pub use veza_resilience::{ResilienceConfig, ResilienceState};
    pub use veza_transport::{MediaSender, PeerTransport, TransportState};

    pub use crate::{Monitor, MonitorConfig, ObserverHandle, QualityLoop};
}
