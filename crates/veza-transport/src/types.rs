use url::Url;

/// Connection lifecycle of the underlying peer transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// Whether this state is a hard failure requiring recovery.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Kind of media carried by a track.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
}

/// A STUN/TURN server entry used for negotiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IceServer {
    pub urls: Vec<Url>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServer {
    pub fn new(url: Url) -> Self {
        Self {
            urls: vec![url],
            username: None,
            credential: None,
        }
    }

    /// Parse a single server URL (e.g. `stun:stun.example.org:3478`).
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.credential = Some(credential.into());
        self
    }
}

/// Raw statistics snapshot as reported by the transport.
///
/// Entries keep their per-stream granularity; flattening into a single
/// metrics record happens downstream. All time fields are milliseconds and
/// all rates are bits per second, regardless of what the underlying engine
/// reports natively.
#[derive(Clone, Debug, Default)]
pub struct StatsReport {
    pub timestamp_ms: u64,
    pub entries: Vec<StatsEntry>,
}

impl StatsReport {
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: StatsEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// The nominated candidate pair, if the transport reported one.
    pub fn nominated_pair(&self) -> Option<&CandidatePairStats> {
        self.entries.iter().find_map(|entry| match entry {
            StatsEntry::CandidatePair(pair) if pair.nominated => Some(pair),
            _ => None,
        })
    }
}

/// One report inside a [`StatsReport`].
#[derive(Clone, Debug)]
pub enum StatsEntry {
    InboundRtp(InboundRtpStats),
    OutboundRtp(OutboundRtpStats),
    CandidatePair(CandidatePairStats),
}

/// Per-stream inbound statistics.
#[derive(Clone, Debug, Default)]
pub struct InboundRtpStats {
    pub kind: MediaKind,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub bytes_received: u64,
    pub jitter_ms: f64,
    pub frames_per_second: Option<f64>,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
}

/// Per-stream outbound statistics.
#[derive(Clone, Debug, Default)]
pub struct OutboundRtpStats {
    pub kind: MediaKind,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub target_bitrate_bps: Option<u64>,
}

/// Statistics for one negotiated network path. The `nominated` pair is the
/// currently active path and the source of RTT/bandwidth measurements.
#[derive(Clone, Debug, Default)]
pub struct CandidatePairStats {
    pub nominated: bool,
    pub current_rtt_ms: f64,
    pub available_outgoing_bitrate_bps: Option<u64>,
    pub available_incoming_bitrate_bps: Option<u64>,
}

/// Adjustable encoding parameters of an outgoing track.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SenderParameters {
    pub encodings: Vec<EncodingParameters>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodingParameters {
    pub rid: Option<String>,
    pub max_bitrate_bps: Option<u64>,
    pub scale_resolution_down_by: Option<f64>,
}
