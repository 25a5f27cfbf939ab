//! In-memory fakes for the transport seam.
//!
//! The unimock APIs on [`PeerTransport`]/[`MediaSender`] cover single-call
//! expectations well, but recovery and adaptation tests need multi-step
//! scenarios: a restart that flips the connection state a moment later, a
//! scripted sequence of stats results, a sender that records every parameter
//! write. These fakes keep that state explicitly and are shared across the
//! workspace's test suites.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    error::{TransportError, TransportResult},
    traits::{MediaSender, PeerTransport},
    types::{IceServer, MediaKind, SenderParameters, StatsReport, TransportState},
};

/// What a scripted negotiation restart should do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RestartBehavior {
    /// The restart succeeds and the transport transitions to `Connected`.
    Recover,
    /// The restart call succeeds but no state transition ever follows
    /// (drives the caller into its timeout path).
    Hang,
    /// The restart call itself fails.
    Fail,
}

struct TransportInner {
    stats: Mutex<VecDeque<TransportResult<StatsReport>>>,
    senders: Mutex<Vec<Arc<dyn MediaSender>>>,
    state: Mutex<TransportState>,
    state_tx: broadcast::Sender<TransportState>,
    restart_script: Mutex<VecDeque<RestartBehavior>>,
    restarts: AtomicUsize,
    configure_script: Mutex<VecDeque<TransportResult<()>>>,
    applied_servers: Mutex<Vec<Vec<IceServer>>>,
}

/// Scriptable [`PeerTransport`] implementation.
#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<TransportInner>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(TransportInner {
                stats: Mutex::new(VecDeque::new()),
                senders: Mutex::new(Vec::new()),
                state: Mutex::new(TransportState::Connected),
                state_tx,
                restart_script: Mutex::new(VecDeque::new()),
                restarts: AtomicUsize::new(0),
                configure_script: Mutex::new(VecDeque::new()),
                applied_servers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue the result of the next `get_stats` call. With an empty queue the
    /// fake returns an empty report.
    pub fn push_stats(&self, result: TransportResult<StatsReport>) {
        self.inner.stats.lock().push_back(result);
    }

    pub fn add_sender(&self, sender: Arc<dyn MediaSender>) {
        self.inner.senders.lock().push(sender);
    }

    /// Queue behavior for the next `restart_negotiation` call. With an empty
    /// queue restarts hang (no state transition).
    pub fn script_restart(&self, behavior: RestartBehavior) {
        self.inner.restart_script.lock().push_back(behavior);
    }

    /// Queue the result of the next `set_ice_servers` call (defaults to `Ok`).
    pub fn script_configure(&self, result: TransportResult<()>) {
        self.inner.configure_script.lock().push_back(result);
    }

    /// Transition the connection state and notify subscribers.
    pub fn set_state(&self, state: TransportState) {
        *self.inner.state.lock() = state;
        let _ = self.inner.state_tx.send(state);
    }

    pub fn restart_count(&self) -> usize {
        self.inner.restarts.load(Ordering::Acquire)
    }

    /// Server lists applied via `set_ice_servers`, in call order.
    pub fn applied_servers(&self) -> Vec<Vec<IceServer>> {
        self.inner.applied_servers.lock().clone()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn get_stats(&self) -> TransportResult<StatsReport> {
        self.inner
            .stats
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(StatsReport::default()))
    }

    fn senders(&self) -> Vec<Arc<dyn MediaSender>> {
        self.inner.senders.lock().clone()
    }

    fn connection_state(&self) -> TransportState {
        *self.inner.state.lock()
    }

    fn state_changes(&self) -> broadcast::Receiver<TransportState> {
        self.inner.state_tx.subscribe()
    }

    async fn restart_negotiation(&self) -> TransportResult<()> {
        self.inner.restarts.fetch_add(1, Ordering::AcqRel);
        let behavior = self
            .inner
            .restart_script
            .lock()
            .pop_front()
            .unwrap_or(RestartBehavior::Hang);
        match behavior {
            RestartBehavior::Recover => {
                self.set_state(TransportState::Connected);
                Ok(())
            }
            RestartBehavior::Hang => Ok(()),
            RestartBehavior::Fail => Err(TransportError::negotiation("scripted restart failure")),
        }
    }

    async fn set_ice_servers(&self, servers: Vec<IceServer>) -> TransportResult<()> {
        let result = self
            .inner
            .configure_script
            .lock()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.inner.applied_servers.lock().push(servers);
        }
        result
    }
}

struct SenderInner {
    kind: MediaKind,
    params: Mutex<SenderParameters>,
    fail_script: Mutex<VecDeque<TransportError>>,
    applied: Mutex<Vec<SenderParameters>>,
}

/// Recording [`MediaSender`] implementation.
#[derive(Clone)]
pub struct FakeSender {
    inner: Arc<SenderInner>,
}

impl FakeSender {
    /// A sender with a single empty encoding, matching a freshly added track.
    pub fn new(kind: MediaKind) -> Self {
        Self {
            inner: Arc::new(SenderInner {
                kind,
                params: Mutex::new(SenderParameters {
                    encodings: vec![Default::default()],
                }),
                fail_script: Mutex::new(VecDeque::new()),
                applied: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A sender whose parameters carry no encodings yet.
    pub fn without_encodings(kind: MediaKind) -> Self {
        let sender = Self::new(kind);
        sender.inner.params.lock().encodings.clear();
        sender
    }

    /// Queue an error for the next `set_parameters` call; the write is
    /// rejected and nothing is recorded.
    pub fn fail_next_apply(&self, error: TransportError) {
        self.inner.fail_script.lock().push_back(error);
    }

    /// Max bitrate of the first encoding, as last applied.
    pub fn max_bitrate_bps(&self) -> Option<u64> {
        self.inner
            .params
            .lock()
            .encodings
            .first()
            .and_then(|encoding| encoding.max_bitrate_bps)
    }

    /// Every parameter set successfully applied, in call order.
    pub fn applied(&self) -> Vec<SenderParameters> {
        self.inner.applied.lock().clone()
    }
}

#[async_trait]
impl MediaSender for FakeSender {
    fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    fn parameters(&self) -> SenderParameters {
        self.inner.params.lock().clone()
    }

    async fn set_parameters(&self, params: SenderParameters) -> TransportResult<()> {
        if let Some(error) = self.inner.fail_script.lock().pop_front() {
            return Err(error);
        }
        *self.inner.params.lock() = params.clone();
        self.inner.applied.lock().push(params);
        Ok(())
    }
}
