use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    sync::Mutex as AsyncMutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use veza_abr::{BitrateController, BitrateEnvelope};
use veza_events::{EventBus, QualityEvent};
use veza_quality::{
    AdaptationConfig, MetricsSnapshot, QualityScore, QualityScorer, StatsSampler,
};
use veza_transport::PeerTransport;

use crate::observers::{ObserverHandle, ObserverRegistry};

/// State that survives timer restarts: the envelope and the smoothing window
/// belong to the connection, not to one run of the timer.
struct LoopShared {
    sampler: AsyncMutex<StatsSampler>,
    scorer: Mutex<QualityScorer>,
    abr: AsyncMutex<BitrateController>,
    envelope: Mutex<BitrateEnvelope>,
    latest: Mutex<Option<(QualityScore, MetricsSnapshot)>>,
}

/// Periodic sample → score → adapt loop for one connection.
///
/// Each tick pulls statistics, scores them, lets the bitrate controller
/// react, and publishes the result to the event bus and to registered
/// observers. The loop never errors; every failure mode is handled inside
/// the step that hit it.
///
/// Must be created and started inside a tokio runtime.
pub struct QualityLoop {
    transport: Arc<dyn PeerTransport>,
    config: AdaptationConfig,
    bus: EventBus,
    observers: ObserverRegistry,
    shared: Arc<LoopShared>,
    timer: Option<(CancellationToken, JoinHandle<()>)>,
}

impl QualityLoop {
    pub fn new(transport: Arc<dyn PeerTransport>, config: AdaptationConfig, bus: EventBus) -> Self {
        let shared = Arc::new(LoopShared {
            sampler: AsyncMutex::new(StatsSampler::new(Arc::clone(&transport))),
            scorer: Mutex::new(QualityScorer::new(config.clone())),
            abr: AsyncMutex::new(BitrateController::new(config.clone())),
            envelope: Mutex::new(BitrateEnvelope::new(
                config.min_bitrate_bps,
                config.max_bitrate_bps,
            )),
            latest: Mutex::new(None),
        });
        Self {
            transport,
            config,
            bus,
            observers: ObserverRegistry::new(),
            shared,
            timer: None,
        }
    }

    /// Register a per-tick observer. Observers run synchronously in
    /// registration order after each completed tick.
    pub fn observe(
        &self,
        observer: impl Fn(&QualityScore, &MetricsSnapshot) + Send + Sync + 'static,
    ) -> ObserverHandle {
        self.observers.register(observer)
    }

    /// Start the timer. Starting while already running replaces the previous
    /// timer; there is never more than one active per loop.
    pub fn start(&mut self) {
        self.stop();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.transport),
            self.config.clone(),
            self.bus.clone(),
            self.observers.clone(),
            Arc::clone(&self.shared),
            cancel.clone(),
        ));
        self.timer = Some((cancel, handle));
    }

    /// Cancel the timer. Idempotent; an in-flight step finishes but its
    /// result is discarded.
    pub fn stop(&mut self) {
        if let Some((cancel, _handle)) = self.timer.take() {
            cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Most recent published score and snapshot, if any tick completed yet.
    pub fn latest(&self) -> Option<(QualityScore, MetricsSnapshot)> {
        self.shared.latest.lock().clone()
    }

    /// Current bitrate envelope.
    pub fn envelope(&self) -> BitrateEnvelope {
        *self.shared.envelope.lock()
    }
}

impl Drop for QualityLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    transport: Arc<dyn PeerTransport>,
    config: AdaptationConfig,
    bus: EventBus,
    observers: ObserverRegistry,
    shared: Arc<LoopShared>,
    cancel: CancellationToken,
) {
    let period = config.adaptation_interval;
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    // A step that overruns the interval simply skips the ticks it missed;
    // steps never overlap and never queue up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(interval_ms = period.as_millis() as u64, "quality loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = shared.sampler.lock().await.sample().await;
        let score = shared.scorer.lock().score(&snapshot);

        let envelope = {
            let mut abr = shared.abr.lock().await;
            abr.adapt(&score, &snapshot, transport.as_ref()).await
        };

        // A stop that landed while this step was in flight discards it.
        if cancel.is_cancelled() {
            break;
        }

        let previous_bps = shared.envelope.lock().current_bps;
        *shared.envelope.lock() = envelope;
        *shared.latest.lock() = Some((score, snapshot.clone()));

        if envelope.current_bps != previous_bps {
            bus.publish(QualityEvent::BitrateChanged {
                previous_bps,
                current_bps: envelope.current_bps,
            });
        }
        bus.publish(QualityEvent::Sample {
            score,
            snapshot: snapshot.clone(),
        });
        observers.notify(&score, &snapshot);
    }

    debug!("quality loop stopped");
}
