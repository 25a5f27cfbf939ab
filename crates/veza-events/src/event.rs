#![forbid(unsafe_code)]

use crate::{ConnectionEvent, QualityEvent};

/// Unified event for one monitored connection.
///
/// Hierarchical: each subsystem has its own variant with a sub-enum.
#[derive(Clone, Debug)]
pub enum Event {
    /// Quality loop event.
    Quality(QualityEvent),
    /// Connection resilience event.
    Connection(ConnectionEvent),
}

impl From<QualityEvent> for Event {
    fn from(e: QualityEvent) -> Self {
        Self::Quality(e)
    }
}

impl From<ConnectionEvent> for Event {
    fn from(e: ConnectionEvent) -> Self {
        Self::Connection(e)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn quality_is_bitrate_change(event: &QualityEvent) -> bool {
        matches!(
            event,
            QualityEvent::BitrateChanged {
                previous_bps: 1_000_000,
                current_bps: 800_000,
            }
        )
    }

    #[rstest]
    #[case(
        QualityEvent::BitrateChanged { previous_bps: 1_000_000, current_bps: 800_000 },
        quality_is_bitrate_change
    )]
    fn quality_event_into_event(
        #[case] quality_event: QualityEvent,
        #[case] check: fn(&QualityEvent) -> bool,
    ) {
        let event: Event = quality_event.into();
        assert!(matches!(event, Event::Quality(inner) if check(&inner)));
    }

    #[test]
    fn connection_event_into_event() {
        let event: Event = ConnectionEvent::Recovered { attempt: 2 }.into();
        assert!(matches!(
            event,
            Event::Connection(ConnectionEvent::Recovered { attempt: 2 })
        ));
    }
}
