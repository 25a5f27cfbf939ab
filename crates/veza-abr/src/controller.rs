use tracing::{debug, trace, warn};
use veza_quality::{AdaptationConfig, MetricsSnapshot, QualityLevel, QualityScore};
use veza_transport::{
    EncodingParameters, MediaKind, MediaSender, PeerTransport, TransportResult,
};

use crate::envelope::BitrateEnvelope;

/// Margin the smoothed score must exceed the target by before the rate grows.
/// Growth right at the target would sit on the decision boundary and flap.
const GROWTH_MARGIN: f64 = 0.1;

/// Audio stays pinned at a constant rate while video adapts.
const AUDIO_BITRATE_BPS: u64 = 64_000;

/// Why the controller picked a target bitrate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdaptReason {
    /// Packet loss or RTT above the configured thresholds.
    Congestion,
    /// Smoothed quality classified Fair or Poor.
    DegradedQuality,
    /// Excellent quality with margin above the target; room to grow.
    Headroom,
    /// Inside the dead zone; rate left unchanged.
    DeadZone,
}

/// Computes and applies the outgoing bitrate for one connection.
///
/// Owns the [`BitrateEnvelope`]; nothing else mutates it. `adapt` never
/// returns an error: apply failures are logged and rolled back locally.
pub struct BitrateController {
    config: AdaptationConfig,
    envelope: BitrateEnvelope,
}

impl BitrateController {
    pub fn new(config: AdaptationConfig) -> Self {
        let envelope = BitrateEnvelope::new(config.min_bitrate_bps, config.max_bitrate_bps);
        Self { config, envelope }
    }

    /// Current envelope (bounds and target rate).
    pub fn envelope(&self) -> BitrateEnvelope {
        self.envelope
    }

    /// Pick the next target rate for the given score and metrics.
    ///
    /// Pure with respect to the transport; `adapt` is the effectful wrapper.
    /// Shrink and grow use fixed multiplicative factors with no minimum step,
    /// clamped to the envelope bounds.
    pub fn decide(&self, score: &QualityScore, metrics: &MetricsSnapshot) -> (u64, AdaptReason) {
        let current = self.envelope.current_bps as f64;

        if metrics.packet_loss_percent > self.config.target_packet_loss_percent
            || metrics.round_trip_time_ms > self.config.rtt_threshold_ms
        {
            let target = self
                .envelope
                .clamp((current * self.config.shrink_factor) as u64);
            return (target, AdaptReason::Congestion);
        }

        if score.level.is_degraded() {
            let target = self
                .envelope
                .clamp((current * self.config.shrink_factor) as u64);
            return (target, AdaptReason::DegradedQuality);
        }

        if score.level == QualityLevel::Excellent
            && score.value > self.config.target_quality + GROWTH_MARGIN
        {
            let target = self
                .envelope
                .clamp((current * self.config.grow_factor) as u64);
            return (target, AdaptReason::Headroom);
        }

        (self.envelope.current_bps, AdaptReason::DeadZone)
    }

    /// Adapt the outgoing bitrate and apply it to the video sender.
    ///
    /// No-ops (returning the envelope unchanged) when the decision lands on
    /// the current rate or when no outgoing video sender exists; the latter
    /// is "nothing to adapt", not an error. On an apply failure the envelope
    /// rolls back to its pre-attempt value; no partial state is retained.
    pub async fn adapt(
        &mut self,
        score: &QualityScore,
        metrics: &MetricsSnapshot,
        transport: &dyn PeerTransport,
    ) -> BitrateEnvelope {
        let (target_bps, reason) = self.decide(score, metrics);
        if target_bps == self.envelope.current_bps {
            trace!(?reason, current_bps = target_bps, "bitrate unchanged");
            return self.envelope;
        }

        let senders = transport.senders();
        let Some(video) = senders.iter().find(|s| s.kind() == MediaKind::Video) else {
            trace!("no outgoing video sender, nothing to adapt");
            return self.envelope;
        };

        let previous_bps = self.envelope.current_bps;
        self.envelope.current_bps = target_bps;

        if let Err(err) = apply_max_bitrate(video.as_ref(), target_bps).await {
            warn!(
                error = %err,
                target_bps,
                "failed to apply encoding parameters, rolling back"
            );
            self.envelope.current_bps = previous_bps;
            return self.envelope;
        }

        debug!(?reason, previous_bps, current_bps = target_bps, "bitrate adapted");

        for audio in senders.iter().filter(|s| s.kind() == MediaKind::Audio) {
            if let Err(err) = apply_max_bitrate(audio.as_ref(), AUDIO_BITRATE_BPS).await {
                debug!(error = %err, "failed to pin audio bitrate");
            }
        }

        self.envelope
    }
}

async fn apply_max_bitrate(sender: &dyn MediaSender, bps: u64) -> TransportResult<()> {
    let mut params = sender.parameters();
    if params.encodings.is_empty() {
        params.encodings.push(EncodingParameters::default());
    }
    params.encodings[0].max_bitrate_bps = Some(bps);
    sender.set_parameters(params).await
}
