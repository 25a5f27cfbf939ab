use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use tokio::{
    sync::broadcast,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use veza_events::{ConnectionEvent, EventBus};
use veza_transport::{PeerTransport, TransportState};

use crate::{
    config::ResilienceConfig,
    error::{ResilienceError, ResilienceResult},
    state::{RecoveryAction, ResilienceState, TerminalReason},
};

struct Machine {
    state: ResilienceState,
    attempts: u32,
    terminal: Option<TerminalReason>,
}

struct ControllerInner {
    transport: Arc<dyn PeerTransport>,
    config: ResilienceConfig,
    bus: EventBus,
    machine: Mutex<Machine>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag even when the recovery future is dropped
/// mid-cycle (connection teardown cancels the pending timeout with it).
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives recovery for one transport.
///
/// Cheap to clone; all clones share the single state machine, so only one
/// recovery sequence can ever be in flight.
#[derive(Clone)]
pub struct ResilienceController {
    inner: Arc<ControllerInner>,
}

impl ResilienceController {
    pub fn new(transport: Arc<dyn PeerTransport>, config: ResilienceConfig, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                transport,
                config,
                bus,
                machine: Mutex::new(Machine {
                    state: ResilienceState::Stable,
                    attempts: 0,
                    terminal: None,
                }),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> ResilienceState {
        self.inner.machine.lock().state
    }

    /// Top-level recovery cycles since the last stable period.
    pub fn attempts(&self) -> u32 {
        self.inner.machine.lock().attempts
    }

    /// Operator-initiated fresh start: back to `Stable` with a zeroed attempt
    /// counter, re-enabling automatic recovery after exhaustion.
    pub fn reset(&self) {
        let mut machine = self.inner.machine.lock();
        machine.state = ResilienceState::Stable;
        machine.attempts = 0;
        machine.terminal = None;
        debug!("resilience state reset");
    }

    /// React to a transport failure.
    ///
    /// Runs one full recovery cycle: in-place restart, then the fallback
    /// servers in order. A signal arriving while a cycle is in flight is a
    /// silent no-op (the running cycle owns the recovery); a signal after
    /// exhaustion returns the terminal error without emitting anything.
    pub async fn handle_failure(&self) -> ResilienceResult<()> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("failure signal ignored, recovery already in flight");
            return Ok(());
        }
        let _guard = InFlightGuard(&self.inner.in_flight);
        self.run_cycle().await
    }

    /// Consume transport state changes and recover on failure, until
    /// cancelled or recovery gives up for good.
    ///
    /// Cancellation mid-cycle drops the pending attempt (and its timeout)
    /// on the floor; nothing fires after teardown.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut state_rx = self.inner.transport.state_changes();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = state_rx.recv() => match received {
                    Ok(state) => {
                        self.inner.bus.publish(ConnectionEvent::StateChanged { state });
                        // Re-check the live state: a failure queued while a
                        // recovery cycle was running is stale once the
                        // transport is connected again.
                        if state.is_failed() && self.inner.transport.connection_state().is_failed() {
                            let outcome = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => break,
                                outcome = self.handle_failure() => outcome,
                            };
                            if let Err(err) = outcome {
                                warn!(error = %err, "automatic recovery gave up");
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "state change stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    async fn run_cycle(&self) -> ResilienceResult<()> {
        let inner = &self.inner;

        let (attempt, entry_actions) = {
            let mut machine = inner.machine.lock();
            let (next, actions) = machine
                .state
                .on_failure(machine.attempts, inner.config.max_reconnect_attempts);
            let entered_recovery = machine.state == ResilienceState::Stable
                && next == ResilienceState::Recovering;
            machine.state = next;
            if entered_recovery {
                machine.attempts += 1;
            }
            (machine.attempts, actions)
        };

        let mut pending_restart = false;
        for action in entry_actions {
            match action {
                RecoveryAction::RestartNegotiation => pending_restart = true,
                RecoveryAction::ReportTerminal(reason) => return self.report_terminal(reason),
                RecoveryAction::ApplyFallback { .. } | RecoveryAction::ResetAttempts => {}
            }
        }
        if !pending_restart {
            // Already exhausted: repeat the terminal error without a new event.
            let terminal = inner.machine.lock().terminal;
            return match terminal {
                Some(reason) => Err(ResilienceError::Unrecoverable(reason)),
                None => Ok(()),
            };
        }

        inner
            .bus
            .publish(ConnectionEvent::RecoveryStarted { attempt });
        debug!(attempt, "starting recovery cycle");
        sleep(inner.config.reconnect_interval).await;

        // One iteration per restart attempt: first in place, then once per
        // fallback server, as directed by the state machine.
        let mut skip_restart = false;
        loop {
            let success = if skip_restart {
                skip_restart = false;
                false
            } else {
                self.attempt_restart().await
            };

            let (next, actions) = {
                let mut machine = inner.machine.lock();
                let (next, actions) = machine
                    .state
                    .on_attempt_outcome(success, inner.config.fallback_servers.len());
                machine.state = next;
                (next, actions)
            };

            let mut restart_again = false;
            for action in actions {
                match action {
                    RecoveryAction::ResetAttempts => {
                        inner.machine.lock().attempts = 0;
                    }
                    RecoveryAction::ApplyFallback { server_index } => {
                        let server = inner.config.fallback_servers[server_index].clone();
                        inner
                            .bus
                            .publish(ConnectionEvent::FallbackApplied { server_index });
                        debug!(server_index, "applying fallback server configuration");
                        if let Err(err) = inner.transport.set_ice_servers(vec![server]).await {
                            warn!(error = %err, server_index, "fallback configuration rejected");
                            // Counts as a failed attempt for this server.
                            skip_restart = true;
                        }
                    }
                    RecoveryAction::RestartNegotiation => restart_again = true,
                    RecoveryAction::ReportTerminal(reason) => {
                        return self.report_terminal(reason);
                    }
                }
            }

            if next == ResilienceState::Stable {
                inner.bus.publish(ConnectionEvent::Recovered { attempt });
                debug!(attempt, "connection recovered");
                return Ok(());
            }
            if !restart_again && !skip_restart {
                return Ok(());
            }
        }
    }

    /// One negotiation restart, waiting up to `peer_timeout` for the
    /// transport to report `Connected`.
    async fn attempt_restart(&self) -> bool {
        let inner = &self.inner;
        // Subscribe before restarting so a fast transition cannot be missed.
        let mut state_rx = inner.transport.state_changes();

        if let Err(err) = inner.transport.restart_negotiation().await {
            warn!(error = %err, "negotiation restart failed");
            return false;
        }
        if inner.transport.connection_state() == TransportState::Connected {
            return true;
        }

        let wait_for_connected = async {
            loop {
                match state_rx.recv().await {
                    Ok(TransportState::Connected) => return true,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if inner.transport.connection_state() == TransportState::Connected {
                            return true;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        };

        match timeout(inner.config.peer_timeout, wait_for_connected).await {
            Ok(connected) => connected,
            Err(_) => {
                debug!(
                    timeout_ms = inner.config.peer_timeout.as_millis() as u64,
                    "recovery attempt timed out"
                );
                false
            }
        }
    }

    fn report_terminal(&self, reason: TerminalReason) -> ResilienceResult<()> {
        self.inner.machine.lock().terminal = Some(reason);
        warn!(%reason, "connection unrecoverable");
        self.inner.bus.publish(ConnectionEvent::Unrecoverable {
            reason: reason.to_string(),
        });
        Err(ResilienceError::Unrecoverable(reason))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use veza_events::Event;
    use veza_transport::{
        IceServer,
        testing::{FakeTransport, RestartBehavior},
    };

    use super::*;

    fn fast_config(fallbacks: usize) -> ResilienceConfig {
        let servers = (0..fallbacks)
            .map(|i| IceServer::parse(&format!("stun:fallback{i}.example.org:3478")).unwrap())
            .collect();
        ResilienceConfig::default()
            .with_reconnect_interval(Duration::from_millis(10))
            .with_peer_timeout(Duration::from_millis(100))
            .with_fallback_servers(servers)
    }

    fn controller(
        transport: &FakeTransport,
        config: ResilienceConfig,
    ) -> (ResilienceController, broadcast::Receiver<Event>) {
        let bus = EventBus::new(64);
        let rx = bus.subscribe();
        let controller = ResilienceController::new(Arc::new(transport.clone()), config, bus);
        (controller, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::Connection(connection) = event {
                events.push(connection);
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn in_place_recovery_returns_to_stable() {
        let transport = FakeTransport::new();
        transport.set_state(TransportState::Failed);
        transport.script_restart(RestartBehavior::Recover);
        let (controller, mut rx) = controller(&transport, fast_config(2));

        controller.handle_failure().await.unwrap();

        assert_eq!(controller.state(), ResilienceState::Stable);
        assert_eq!(controller.attempts(), 0);
        assert_eq!(transport.restart_count(), 1);
        assert!(transport.applied_servers().is_empty());

        let events = drain(&mut rx);
        assert!(
            matches!(events[0], ConnectionEvent::RecoveryStarted { attempt: 1 }),
            "unexpected events: {events:?}"
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, ConnectionEvent::Recovered { attempt: 1 })));
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_server_recovers_after_timeout() {
        let transport = FakeTransport::new();
        transport.set_state(TransportState::Failed);
        // In-place restart hangs until the timeout; the first fallback works.
        transport.script_restart(RestartBehavior::Hang);
        transport.script_restart(RestartBehavior::Recover);
        let (controller, mut rx) = controller(&transport, fast_config(2));

        controller.handle_failure().await.unwrap();

        assert_eq!(controller.state(), ResilienceState::Stable);
        assert_eq!(controller.attempts(), 0);
        assert_eq!(transport.restart_count(), 2);
        assert_eq!(transport.applied_servers().len(), 1);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ConnectionEvent::FallbackApplied { server_index: 0 })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ConnectionEvent::Recovered { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_all_fallbacks_is_terminal() {
        let transport = FakeTransport::new();
        transport.set_state(TransportState::Failed);
        // Every restart hangs: in-place plus both fallbacks all time out.
        let (controller, mut rx) = controller(&transport, fast_config(2));

        let result = controller.handle_failure().await;
        assert_eq!(
            result,
            Err(ResilienceError::Unrecoverable(
                TerminalReason::FallbacksExhausted
            ))
        );
        assert_eq!(controller.state(), ResilienceState::Exhausted);
        assert_eq!(transport.restart_count(), 3);
        assert_eq!(transport.applied_servers().len(), 2);

        let events = drain(&mut rx);
        let terminal = events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::Unrecoverable { .. }))
            .count();
        assert_eq!(terminal, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_emit_exactly_one_terminal_event() {
        let transport = FakeTransport::new();
        transport.set_state(TransportState::Failed);
        let (controller, mut rx) = controller(&transport, fast_config(2));

        // Five consecutive failure signals with every restart hanging.
        for _ in 0..5 {
            let _ = controller.handle_failure().await;
        }

        assert_eq!(controller.state(), ResilienceState::Exhausted);
        assert!(controller.attempts() <= 3);

        let events = drain(&mut rx);
        let terminal = events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::Unrecoverable { .. }))
            .count();
        assert_eq!(terminal, 1, "terminal event must fire exactly once");

        // Later signals still report the terminal error to the caller.
        let result = controller.handle_failure().await;
        assert_eq!(
            result,
            Err(ResilienceError::Unrecoverable(
                TerminalReason::FallbacksExhausted
            ))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failure_signal_is_ignored() {
        let transport = FakeTransport::new();
        transport.set_state(TransportState::Failed);
        let (controller, _rx) = controller(&transport, fast_config(0));

        let background = controller.clone();
        let first = tokio::spawn(async move { background.handle_failure().await });

        // Let the first cycle reach its in-flight section without advancing
        // the clock, then signal again.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let second = controller.handle_failure().await;
        assert_eq!(second, Ok(()), "concurrent signal must be a no-op");
        assert_eq!(controller.attempts(), 1, "attempt count must not change");

        let _ = first.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_exhaustion_allows_a_fresh_cycle() {
        let transport = FakeTransport::new();
        transport.set_state(TransportState::Failed);
        let (controller, _rx) = controller(&transport, fast_config(0));

        let _ = controller.handle_failure().await;
        assert_eq!(controller.state(), ResilienceState::Exhausted);

        controller.reset();
        assert_eq!(controller.state(), ResilienceState::Stable);
        assert_eq!(controller.attempts(), 0);

        transport.script_restart(RestartBehavior::Recover);
        controller.handle_failure().await.unwrap();
        assert_eq!(controller.state(), ResilienceState::Stable);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_fallback_configuration_counts_as_failed_attempt() {
        let transport = FakeTransport::new();
        transport.set_state(TransportState::Failed);
        // First fallback configuration is rejected outright; the second works.
        transport.script_configure(Err(veza_transport::TransportError::Configuration(
            "unreachable".into(),
        )));
        transport.script_restart(RestartBehavior::Hang);
        transport.script_restart(RestartBehavior::Recover);
        let (controller, _rx) = controller(&transport, fast_config(2));

        controller.handle_failure().await.unwrap();
        assert_eq!(controller.state(), ResilienceState::Stable);
        // Rejected server never got a restart: one in-place, one for server 1.
        assert_eq!(transport.restart_count(), 2);
        assert_eq!(transport.applied_servers().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_recovers_automatically_on_failed_state() {
        let transport = FakeTransport::new();
        transport.script_restart(RestartBehavior::Recover);
        let (controller, mut rx) = controller(&transport, fast_config(0));

        let cancel = CancellationToken::new();
        let runner = {
            let controller = controller.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { controller.run(cancel).await })
        };

        // Give the run loop a chance to subscribe before failing.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        transport.set_state(TransportState::Failed);

        // Wait for the recovery to complete.
        loop {
            match rx.recv().await.unwrap() {
                Event::Connection(ConnectionEvent::Recovered { .. }) => break,
                _ => {}
            }
        }
        assert_eq!(controller.state(), ResilienceState::Stable);

        cancel.cancel();
        runner.await.unwrap();
    }
}
