use std::time::Duration;

/// Tuning knobs for the quality/adaptation loop of one connection.
///
/// Supplied once at construction and immutable for the lifetime of the loop;
/// every connection carries its own copy, there is no shared global config.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptationConfig {
    /// Lower bound for the outgoing bitrate envelope.
    pub min_bitrate_bps: u64,
    /// Upper bound for the outgoing bitrate envelope, also the starting rate.
    pub max_bitrate_bps: u64,
    /// Smoothed score above which the connection is considered healthy.
    pub target_quality: f64,
    /// Packet loss (percent) above which the loop shrinks the bitrate.
    pub target_packet_loss_percent: f64,
    /// Round-trip time (ms) above which the loop shrinks the bitrate.
    pub rtt_threshold_ms: f64,
    /// Cadence of the sample → score → adapt cycle.
    pub adaptation_interval: Duration,
    /// Multiplicative factor applied when shrinking the bitrate.
    ///
    /// There is deliberately no minimum step size or per-tick rate limit;
    /// convergence speed near the bounds is tuned through this factor alone.
    pub shrink_factor: f64,
    /// Multiplicative factor applied when growing the bitrate.
    pub grow_factor: f64,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            min_bitrate_bps: 100_000,
            max_bitrate_bps: 2_500_000,
            target_quality: 0.8,
            target_packet_loss_percent: 2.0,
            rtt_threshold_ms: 300.0,
            adaptation_interval: Duration::from_secs(2),
            shrink_factor: 0.8,
            grow_factor: 1.2,
        }
    }
}

impl AdaptationConfig {
    pub fn with_bitrate_bounds(mut self, min_bps: u64, max_bps: u64) -> Self {
        self.min_bitrate_bps = min_bps;
        self.max_bitrate_bps = max_bps;
        self
    }

    pub fn with_target_quality(mut self, target: f64) -> Self {
        self.target_quality = target;
        self
    }

    pub fn with_target_packet_loss_percent(mut self, percent: f64) -> Self {
        self.target_packet_loss_percent = percent;
        self
    }

    pub fn with_rtt_threshold_ms(mut self, threshold_ms: f64) -> Self {
        self.rtt_threshold_ms = threshold_ms;
        self
    }

    pub fn with_adaptation_interval(mut self, interval: Duration) -> Self {
        self.adaptation_interval = interval;
        self
    }
}
