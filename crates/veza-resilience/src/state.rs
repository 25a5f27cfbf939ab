use std::fmt;

/// Why recovery gave up for good.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TerminalReason {
    /// The top-level attempt budget was already spent when a new failure
    /// signal arrived.
    AttemptBudgetExhausted { attempts: u32 },
    /// In-place recovery and every configured fallback server failed.
    FallbacksExhausted,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptBudgetExhausted { attempts } => {
                write!(f, "reconnect attempt budget exhausted after {attempts} attempts")
            }
            Self::FallbacksExhausted => write!(f, "all fallback servers failed"),
        }
    }
}

/// Recovery phase of one connection.
///
/// Exactly one instance exists per connection; transitions are driven only
/// by the controller. `Exhausted` latches until an operator-initiated reset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ResilienceState {
    #[default]
    Stable,
    /// In-place recovery (negotiation restart on the current configuration).
    Recovering,
    /// Trying the fallback server at `server_index`.
    Fallback { server_index: usize },
    /// All options spent; refuses further automatic attempts.
    Exhausted,
}

/// Side effects a transition asks the driver to perform, in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RecoveryAction {
    RestartNegotiation,
    ApplyFallback { server_index: usize },
    ResetAttempts,
    ReportTerminal(TerminalReason),
}

impl ResilienceState {
    /// React to a transport failure signal.
    pub(crate) fn on_failure(
        self,
        attempts: u32,
        max_attempts: u32,
    ) -> (Self, Vec<RecoveryAction>) {
        match self {
            Self::Stable if attempts >= max_attempts => (
                Self::Exhausted,
                vec![RecoveryAction::ReportTerminal(
                    TerminalReason::AttemptBudgetExhausted { attempts },
                )],
            ),
            Self::Stable => (Self::Recovering, vec![RecoveryAction::RestartNegotiation]),
            // An in-flight sequence owns the recovery; Exhausted refuses
            // further automatic attempts.
            Self::Recovering | Self::Fallback { .. } | Self::Exhausted => (self, Vec::new()),
        }
    }

    /// React to the outcome of one restart attempt.
    pub(crate) fn on_attempt_outcome(
        self,
        success: bool,
        fallback_count: usize,
    ) -> (Self, Vec<RecoveryAction>) {
        match (self, success) {
            (Self::Recovering | Self::Fallback { .. }, true) => {
                (Self::Stable, vec![RecoveryAction::ResetAttempts])
            }
            (Self::Recovering, false) => next_fallback(0, fallback_count),
            (Self::Fallback { server_index }, false) => {
                next_fallback(server_index + 1, fallback_count)
            }
            (state, _) => (state, Vec::new()),
        }
    }
}

fn next_fallback(server_index: usize, fallback_count: usize) -> (ResilienceState, Vec<RecoveryAction>) {
    if server_index >= fallback_count {
        (
            ResilienceState::Exhausted,
            vec![RecoveryAction::ReportTerminal(
                TerminalReason::FallbacksExhausted,
            )],
        )
    } else {
        (
            ResilienceState::Fallback { server_index },
            vec![
                RecoveryAction::ApplyFallback { server_index },
                RecoveryAction::RestartNegotiation,
            ],
        )
    }
}
