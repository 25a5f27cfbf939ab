#![forbid(unsafe_code)]

use veza_quality::{MetricsSnapshot, QualityScore};

/// Events published by the quality loop.
#[derive(Clone, Debug)]
pub enum QualityEvent {
    /// One completed sampling tick.
    Sample {
        score: QualityScore,
        snapshot: MetricsSnapshot,
    },
    /// The adaptation policy changed the outgoing bitrate.
    BitrateChanged { previous_bps: u64, current_bps: u64 },
}
