use std::sync::Arc;

use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use veza_abr::BitrateEnvelope;
use veza_events::{Event, EventBus};
use veza_quality::{MetricsSnapshot, QualityScore};
use veza_resilience::{ResilienceController, ResilienceState};
use veza_transport::PeerTransport;

use crate::{config::MonitorConfig, observers::ObserverHandle, quality_loop::QualityLoop};

/// Per-connection supervisor: one quality loop plus one resilience
/// controller, sharing a transport handle and an event bus.
///
/// The two sides are independent (the quality loop keeps sampling while a
/// recovery cycle runs) but they are torn down together.
pub struct Monitor {
    quality: QualityLoop,
    resilience: ResilienceController,
    bus: EventBus,
    cancel: CancellationToken,
    resilience_task: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(transport: Arc<dyn PeerTransport>, config: MonitorConfig) -> Self {
        let bus = EventBus::new(config.event_capacity);
        let quality = QualityLoop::new(Arc::clone(&transport), config.adaptation, bus.clone());
        let resilience = ResilienceController::new(transport, config.resilience, bus.clone());
        Self {
            quality,
            resilience,
            bus,
            cancel: CancellationToken::new(),
            resilience_task: None,
        }
    }

    /// Start (or restart) the quality loop and the resilience watcher.
    pub fn start(&mut self) {
        self.quality.start();
        let watcher_alive = self
            .resilience_task
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if !watcher_alive {
            let controller = self.resilience.clone();
            let cancel = self.cancel.child_token();
            self.resilience_task = Some(tokio::spawn(async move { controller.run(cancel).await }));
        }
    }

    /// Subscribe to all quality and connection events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Register a per-tick quality observer.
    pub fn observe(
        &self,
        observer: impl Fn(&QualityScore, &MetricsSnapshot) + Send + Sync + 'static,
    ) -> ObserverHandle {
        self.quality.observe(observer)
    }

    /// Most recent published score and snapshot.
    pub fn latest(&self) -> Option<(QualityScore, MetricsSnapshot)> {
        self.quality.latest()
    }

    /// Current bitrate envelope.
    pub fn envelope(&self) -> BitrateEnvelope {
        self.quality.envelope()
    }

    pub fn resilience_state(&self) -> ResilienceState {
        self.resilience.state()
    }

    /// Operator-initiated fresh start after the controller reported an
    /// unrecoverable connection.
    pub fn reset_resilience(&self) {
        self.resilience.reset();
    }

    /// Stop the quality loop and the resilience watcher. Safe to call any
    /// number of times; pending recovery timeouts are dropped with the
    /// watcher task.
    pub fn shutdown(&mut self) {
        self.quality.stop();
        self.cancel.cancel();
        self.resilience_task.take();
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
