use std::sync::Arc;

use tracing::debug;
use veza_transport::{MediaKind, PeerTransport, StatsEntry, StatsReport};

use crate::metrics::{MetricsSnapshot, Resolution};

/// Pulls raw statistics from the transport and normalizes them into a
/// [`MetricsSnapshot`].
///
/// A failed statistics call never propagates: the sampler logs it and
/// returns the previous snapshot unchanged, so the control loop keeps
/// running on slightly stale data for that tick.
pub struct StatsSampler {
    transport: Arc<dyn PeerTransport>,
    last: MetricsSnapshot,
}

impl StatsSampler {
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            transport,
            last: MetricsSnapshot::default(),
        }
    }

    /// Take one sample. Suspends while the transport gathers statistics.
    pub async fn sample(&mut self) -> MetricsSnapshot {
        let report = match self.transport.get_stats().await {
            Ok(report) => report,
            Err(err) => {
                debug!(error = %err, "stats unavailable, reusing previous snapshot");
                return self.last.clone();
            }
        };

        let snapshot = flatten(&report);
        self.last = snapshot.clone();
        snapshot
    }

    /// The most recent snapshot (all-zero before the first successful sample).
    pub fn last(&self) -> &MetricsSnapshot {
        &self.last
    }
}

/// Reduce a per-stream report to one flat record.
///
/// Packet counts are summed across inbound streams; jitter is the worst
/// stream's value; RTT and available bandwidth come from the nominated
/// candidate pair; the current send rate is the sum of outbound target
/// bitrates; frame rate and resolution come from the first video stream
/// reporting them.
fn flatten(report: &StatsReport) -> MetricsSnapshot {
    let mut packets_received = 0u64;
    let mut packets_lost = 0u64;
    let mut jitter_ms = 0f64;
    let mut current_bitrate_bps = 0u64;
    let mut frame_rate = None;
    let mut resolution = None;

    for entry in &report.entries {
        match entry {
            StatsEntry::InboundRtp(inbound) => {
                packets_received += inbound.packets_received;
                packets_lost += inbound.packets_lost;
                jitter_ms = jitter_ms.max(inbound.jitter_ms);
                if inbound.kind == MediaKind::Video {
                    if frame_rate.is_none() {
                        frame_rate = inbound.frames_per_second;
                    }
                    if resolution.is_none() {
                        if let (Some(width), Some(height)) =
                            (inbound.frame_width, inbound.frame_height)
                        {
                            resolution = Some(Resolution { width, height });
                        }
                    }
                }
            }
            StatsEntry::OutboundRtp(outbound) => {
                current_bitrate_bps += outbound.target_bitrate_bps.unwrap_or(0);
            }
            StatsEntry::CandidatePair(_) => {}
        }
    }

    let pair = report.nominated_pair();

    MetricsSnapshot {
        timestamp_ms: report.timestamp_ms,
        round_trip_time_ms: pair.map_or(0.0, |p| p.current_rtt_ms),
        packet_loss_percent: if packets_received > 0 {
            packets_lost as f64 / packets_received as f64 * 100.0
        } else {
            0.0
        },
        jitter_ms,
        available_bitrate_bps: pair.and_then(|p| p.available_outgoing_bitrate_bps).unwrap_or(0),
        current_bitrate_bps,
        frame_rate,
        resolution,
    }
}
