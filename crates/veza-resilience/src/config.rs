use std::time::Duration;

use veza_transport::IceServer;

/// Recovery policy for one connection. Supplied once at construction,
/// immutable thereafter.
#[derive(Clone, Debug, PartialEq)]
pub struct ResilienceConfig {
    /// Hard ceiling on top-level recovery cycles; once reached, a new failure
    /// signal short-circuits to a permanent-failure report.
    pub max_reconnect_attempts: u32,
    /// Delay before a recovery cycle starts restarting negotiation.
    pub reconnect_interval: Duration,
    /// How long a single restart attempt may wait for the transport to come
    /// back before it counts as failed.
    pub peer_timeout: Duration,
    /// Server configurations tried in order after in-place recovery fails.
    pub fallback_servers: Vec<IceServer>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_interval: Duration::from_secs(2),
            peer_timeout: Duration::from_secs(10),
            fallback_servers: Vec::new(),
        }
    }
}

impl ResilienceConfig {
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    pub fn with_fallback_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.fallback_servers = servers;
        self
    }
}
