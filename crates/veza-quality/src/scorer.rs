use std::collections::VecDeque;

use crate::{config::AdaptationConfig, metrics::MetricsSnapshot};

/// Jitter at or above this many milliseconds scores zero.
const JITTER_CEILING_MS: f64 = 50.0;

/// Number of raw scores averaged into the published score.
const WINDOW_CAPACITY: usize = 5;

/// Ordinal quality classification with fixed cut points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    /// Classify a score in `[0, 1]`. Cut points are fixed at 0.8 / 0.6 / 0.4
    /// and never adjusted dynamically.
    pub fn from_score(value: f64) -> Self {
        if value >= 0.8 {
            Self::Excellent
        } else if value >= 0.6 {
            Self::Good
        } else if value >= 0.4 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Levels at which the adaptation policy shrinks the bitrate.
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::Fair | Self::Poor)
    }
}

/// Smoothed quality assessment of one sampling tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityScore {
    /// Smoothed score in `[0, 1]`.
    pub value: f64,
    pub level: QualityLevel,
    pub sampled_at_ms: u64,
}

/// Fixed-capacity FIFO of recent raw scores; oldest evicted on overflow.
#[derive(Clone, Debug)]
struct ScoreWindow {
    scores: VecDeque<f64>,
}

impl ScoreWindow {
    fn new() -> Self {
        Self {
            scores: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    fn push(&mut self, score: f64) {
        if self.scores.len() == WINDOW_CAPACITY {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    fn mean(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }

    fn clear(&mut self) {
        self.scores.clear();
    }
}

/// Reduces metrics to a bounded quality score.
///
/// Three sub-scores (RTT, packet loss, jitter) are each clamped to `[0, 1]`
/// and averaged; the published value is additionally smoothed over the last
/// [`WINDOW_CAPACITY`] raw scores so a single bad sample does not flip the
/// classification.
pub struct QualityScorer {
    config: AdaptationConfig,
    window: ScoreWindow,
}

impl QualityScorer {
    pub fn new(config: AdaptationConfig) -> Self {
        Self {
            config,
            window: ScoreWindow::new(),
        }
    }

    /// Score one snapshot. Deterministic given the current window contents;
    /// always produces a value.
    pub fn score(&mut self, metrics: &MetricsSnapshot) -> QualityScore {
        let rtt_score =
            (1.0 - metrics.round_trip_time_ms / self.config.rtt_threshold_ms).max(0.0);
        let loss_score = (1.0
            - metrics.packet_loss_percent / self.config.target_packet_loss_percent)
            .max(0.0);
        let jitter_score = (1.0 - metrics.jitter_ms / JITTER_CEILING_MS).max(0.0);

        let raw = (rtt_score + loss_score + jitter_score) / 3.0;
        self.window.push(raw);

        let value = self.window.mean();
        QualityScore {
            value,
            level: QualityLevel::from_score(value),
            sampled_at_ms: metrics.timestamp_ms,
        }
    }

    /// Drop the smoothing window, e.g. after the connection was re-established
    /// and old samples no longer describe the current path.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn snapshot(rtt_ms: f64, loss_percent: f64, jitter_ms: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            round_trip_time_ms: rtt_ms,
            packet_loss_percent: loss_percent,
            jitter_ms,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(0.95, QualityLevel::Excellent)]
    #[case(0.8, QualityLevel::Excellent)]
    #[case(0.79, QualityLevel::Good)]
    #[case(0.6, QualityLevel::Good)]
    #[case(0.59, QualityLevel::Fair)]
    #[case(0.4, QualityLevel::Fair)]
    #[case(0.39, QualityLevel::Poor)]
    #[case(0.0, QualityLevel::Poor)]
    fn level_thresholds_are_exact(#[case] value: f64, #[case] expected: QualityLevel) {
        assert_eq!(QualityLevel::from_score(value), expected);
    }

    #[test]
    fn healthy_metrics_score_excellent() {
        // rtt 50/300 → 0.833, loss 0.5/2 → 0.75, jitter 5/50 → 0.9; mean ≈ 0.83
        let mut scorer = QualityScorer::new(AdaptationConfig::default());
        let score = scorer.score(&snapshot(50.0, 0.5, 5.0));
        assert!((score.value - 0.8277).abs() < 1e-3);
        assert_eq!(score.level, QualityLevel::Excellent);
    }

    #[test]
    fn saturated_metrics_clamp_to_zero() {
        let mut scorer = QualityScorer::new(AdaptationConfig::default());
        let score = scorer.score(&snapshot(400.0, 5.0, 60.0));
        assert_eq!(score.value, 0.0);
        assert_eq!(score.level, QualityLevel::Poor);
    }

    #[rstest]
    #[case(0.0, 0.0, 0.0)]
    #[case(50.0, 0.5, 5.0)]
    #[case(400.0, 5.0, 60.0)]
    #[case(10_000.0, 100.0, 1_000.0)]
    fn score_always_within_unit_interval(
        #[case] rtt_ms: f64,
        #[case] loss: f64,
        #[case] jitter: f64,
    ) {
        let mut scorer = QualityScorer::new(AdaptationConfig::default());
        for _ in 0..10 {
            let score = scorer.score(&snapshot(rtt_ms, loss, jitter));
            assert!((0.0..=1.0).contains(&score.value));
            assert_eq!(score.level, QualityLevel::from_score(score.value));
        }
    }

    #[test]
    fn window_damps_single_spike() {
        let mut scorer = QualityScorer::new(AdaptationConfig::default());
        for _ in 0..4 {
            scorer.score(&snapshot(30.0, 0.0, 2.0));
        }
        // One saturated sample among four healthy ones must not flip the
        // published level to Poor.
        let spiked = scorer.score(&snapshot(500.0, 10.0, 100.0));
        assert!(spiked.value > 0.6);
        assert_ne!(spiked.level, QualityLevel::Poor);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let mut scorer = QualityScorer::new(AdaptationConfig::default());
        scorer.score(&snapshot(500.0, 10.0, 100.0));
        // Five healthy samples push the bad one out entirely.
        let mut last = scorer.score(&snapshot(0.0, 0.0, 0.0));
        for _ in 0..4 {
            last = scorer.score(&snapshot(0.0, 0.0, 0.0));
        }
        assert!((last.value - 1.0).abs() < f64::EPSILON);
        assert_eq!(last.level, QualityLevel::Excellent);
    }

    #[test]
    fn reset_drops_history() {
        let mut scorer = QualityScorer::new(AdaptationConfig::default());
        scorer.score(&snapshot(500.0, 10.0, 100.0));
        scorer.reset();
        let score = scorer.score(&snapshot(0.0, 0.0, 0.0));
        assert!((score.value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sampled_at_carries_snapshot_timestamp() {
        let mut scorer = QualityScorer::new(AdaptationConfig::default());
        let mut metrics = snapshot(50.0, 0.5, 5.0);
        metrics.timestamp_ms = 42_000;
        assert_eq!(scorer.score(&metrics).sampled_at_ms, 42_000);
    }
}
