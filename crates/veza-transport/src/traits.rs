use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
#[cfg(any(test, feature = "testing"))]
use unimock::unimock;

use crate::{
    error::TransportResult,
    types::{IceServer, MediaKind, SenderParameters, StatsReport, TransportState},
};

/// Handle to the underlying peer connection.
///
/// veza calls exactly these operations and nothing else; everything
/// protocol-level (ICE, DTLS, SDP) is the implementor's concern.
#[cfg_attr(any(test, feature = "testing"), unimock(api = PeerTransportMock))]
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Pull a statistics snapshot. May suspend while the engine gathers it.
    async fn get_stats(&self) -> TransportResult<StatsReport>;

    /// Outgoing media senders currently attached to the connection.
    fn senders(&self) -> Vec<Arc<dyn MediaSender>>;

    /// Current connection state.
    fn connection_state(&self) -> TransportState;

    /// Subscribe to connection state transitions.
    fn state_changes(&self) -> broadcast::Receiver<TransportState>;

    /// Restart negotiation on the existing configuration (ICE restart).
    async fn restart_negotiation(&self) -> TransportResult<()>;

    /// Replace the server configuration used for subsequent negotiation.
    async fn set_ice_servers(&self, servers: Vec<IceServer>) -> TransportResult<()>;
}

/// An outgoing media track with adjustable encoding parameters.
#[cfg_attr(any(test, feature = "testing"), unimock(api = MediaSenderMock))]
#[async_trait]
pub trait MediaSender: Send + Sync {
    fn kind(&self) -> MediaKind;

    fn parameters(&self) -> SenderParameters;

    /// Apply new encoding parameters. May suspend while the engine
    /// renegotiates the encoder.
    async fn set_parameters(&self, params: SenderParameters) -> TransportResult<()>;
}
