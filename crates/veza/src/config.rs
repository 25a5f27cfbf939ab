use veza_quality::AdaptationConfig;
use veza_resilience::ResilienceConfig;

/// Unified configuration for one monitored connection.
///
/// Passed by value into [`Monitor::new`](crate::Monitor::new); every
/// connection owns its own copy and nothing is shared process-wide.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    /// Quality sampling and bitrate adaptation settings.
    pub adaptation: AdaptationConfig,
    /// Recovery policy and fallback servers.
    pub resilience: ResilienceConfig,
    /// Capacity of the event bus shared by all components.
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            adaptation: AdaptationConfig::default(),
            resilience: ResilienceConfig::default(),
            event_capacity: 128,
        }
    }
}

impl MonitorConfig {
    pub fn with_adaptation(mut self, adaptation: AdaptationConfig) -> Self {
        self.adaptation = adaptation;
        self
    }

    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
