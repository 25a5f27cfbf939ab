/// Video resolution as reported by the transport.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Flat metrics record produced once per sampling tick.
///
/// Immutable value type: a snapshot is never mutated after creation, only
/// superseded by the next tick's snapshot. Fields the raw report did not
/// carry are zero, so downstream arithmetic never branches on absence;
/// `frame_rate`/`resolution` stay optional because they only exist for video.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub timestamp_ms: u64,
    pub round_trip_time_ms: f64,
    pub packet_loss_percent: f64,
    pub jitter_ms: f64,
    pub available_bitrate_bps: u64,
    pub current_bitrate_bps: u64,
    pub frame_rate: Option<f64>,
    pub resolution: Option<Resolution>,
}
