#![forbid(unsafe_code)]

use veza_transport::TransportState;

/// Events published by the resilience controller.
#[derive(Clone, Debug)]
pub enum ConnectionEvent {
    /// The transport changed state.
    StateChanged { state: TransportState },
    /// A recovery cycle started; `attempt` counts top-level cycles since the
    /// last stable period.
    RecoveryStarted { attempt: u32 },
    /// A fallback server configuration was applied before re-attempting
    /// recovery.
    FallbackApplied { server_index: usize },
    /// The connection came back; the attempt counter has been reset.
    Recovered { attempt: u32 },
    /// All recovery and fallback options are exhausted. Emitted exactly once
    /// per exhaustion; no further automatic attempts follow.
    Unrecoverable { reason: String },
}
