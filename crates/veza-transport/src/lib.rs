#![forbid(unsafe_code)]

//! Transport-facing traits and types for veza.
//!
//! The peer connection itself (ICE, DTLS, SDP negotiation) lives behind the
//! [`PeerTransport`] trait; veza only reads statistics, adjusts sender
//! encoding parameters, and drives negotiation restarts through it.

mod error;
pub mod testing;
mod traits;
mod types;

pub use crate::{
    error::{TransportError, TransportResult},
    traits::{MediaSender, PeerTransport},
    types::{
        CandidatePairStats, EncodingParameters, IceServer, InboundRtpStats, MediaKind,
        OutboundRtpStats, SenderParameters, StatsEntry, StatsReport, TransportState,
    },
};

#[cfg(any(test, feature = "testing"))]
pub use crate::traits::{MediaSenderMock, PeerTransportMock};
