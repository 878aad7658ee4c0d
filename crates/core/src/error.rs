//! Error types for the RTSP client library.

use std::fmt;
use std::time::Duration;

/// Errors that can occur in the RTSP client library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Control messages**: [`MalformedMessage`](Self::MalformedMessage),
///   [`UnsupportedVersion`](Self::UnsupportedVersion).
/// - **RTP framing**: [`TruncatedPacket`](Self::TruncatedPacket),
///   [`UnsupportedRtpVersion`](Self::UnsupportedRtpVersion).
/// - **Depacketization**: [`MissingParameterSets`](Self::MissingParameterSets),
///   [`UnsupportedPayloadType`](Self::UnsupportedPayloadType),
///   [`UnsupportedNaluType`](Self::UnsupportedNaluType),
///   [`CodecParametersChanged`](Self::CodecParametersChanged),
///   [`TimestampOutOfOrder`](Self::TimestampOutOfOrder).
/// - **Transport**: [`Transport`](Self::Transport),
///   [`ConnectionClosed`](Self::ConnectionClosed).
/// - **Session**: [`ProtocolState`](Self::ProtocolState),
///   [`AuthenticationRequired`](Self::AuthenticationRequired),
///   [`RequestFailed`](Self::RequestFailed).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying socket error on the shared control/media connection.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The demultiplexer stopped because the peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to parse an RTSP control message (RFC 2326 §6, §7).
    #[error("malformed RTSP message: {0}")]
    MalformedMessage(ParseErrorKind),

    /// The `RTSP/<major>.<minor>` token was not understood.
    #[error("unsupported protocol version: {0:?}")]
    UnsupportedVersion(String),

    /// A binary field extends past the end of the buffer.
    #[error("truncated packet: needed {needed} bytes, {available} available")]
    TruncatedPacket { needed: usize, available: usize },

    /// RTP version bits were not 2 (RFC 3550 §5.1).
    #[error("unsupported RTP version {0}")]
    UnsupportedRtpVersion(u8),

    /// Codec parameter sets (SPS/PPS or audio config) could not be found.
    #[error("missing codec parameter sets for {0}")]
    MissingParameterSets(String),

    /// Parameter-set or codec configuration bytes were present but unusable.
    #[error("invalid codec configuration: {0}")]
    InvalidCodecConfig(String),

    /// Static payload type with no entry in the RFC 3551 table.
    #[error("unsupported RTP payload type {0}")]
    UnsupportedPayloadType(u8),

    /// H.264 NAL unit type outside the handled set (RFC 6184 §5.2).
    #[error("unsupported H.264 NAL unit type {0}")]
    UnsupportedNaluType(u8),

    /// Both SPS and PPS changed in-band; codec parameters must be re-derived
    /// with [`Session::rederive_codec_params`](crate::Session::rederive_codec_params)
    /// before depacketization can continue.
    #[error("codec parameters changed on track {track}")]
    CodecParametersChanged { track: usize },

    /// Presentation time went backwards or jumped too far forward.
    #[error("timestamp out of order on track {track}: time={time:?} last={last:?}")]
    TimestampOutOfOrder {
        track: usize,
        time: Duration,
        last: Duration,
    },

    /// Operation invoked in the wrong session state.
    #[error("{operation} not allowed in state {state}")]
    ProtocolState {
        operation: &'static str,
        state: String,
    },

    /// The server kept answering 401 after the cached challenge was applied.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The server answered with a non-success status.
    #[error("{method} failed: {status} {reason}")]
    RequestFailed {
        method: &'static str,
        status: u16,
        reason: String,
    },

    /// The RTSP URL could not be used.
    #[error("invalid RTSP URL: {0}")]
    InvalidUrl(String),

    /// The media description body could not be parsed.
    #[error("invalid media description: {0}")]
    InvalidDescriptor(String),
}

impl RtspError {
    pub(crate) fn truncated(needed: usize, available: usize) -> Self {
        Self::TruncatedPacket { needed, available }
    }

    /// Whether the error means the connection is gone for good.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Transport(e) => is_closed(e.kind()),
            _ => false,
        }
    }
}

pub(crate) fn is_closed(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no start line).
    EmptyMessage,
    /// Status line did not have the expected `Version Code Reason` format.
    InvalidStatusLine,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// The method token is not an RTSP method.
    UnknownMethod(String),
    /// Status code was not a three-digit number.
    InvalidStatusCode,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// `Content-Length` was not a decimal number.
    InvalidContentLength,
    /// Fewer body bytes than `Content-Length` announced.
    TruncatedBody,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::UnknownMethod(m) => write!(f, "unknown method {m:?}"),
            Self::InvalidStatusCode => write!(f, "invalid status code"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::InvalidContentLength => write!(f, "invalid content length"),
            Self::TruncatedBody => write!(f, "truncated body"),
        }
    }
}

impl From<ParseErrorKind> for RtspError {
    fn from(kind: ParseErrorKind) -> Self {
        Self::MalformedMessage(kind)
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
