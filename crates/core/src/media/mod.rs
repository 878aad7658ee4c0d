//! RTP parsing and media depacketization.
//!
//! This module turns the RTP packets of one negotiated track back into
//! complete access units (frames / audio samples).
//!
//! ## RTP overview (RFC 3550)
//!
//! Each encoded frame arrives as one or more RTP packets. Every packet
//! carries a 12-byte fixed header ([`rtp::RtpPacket`]) containing:
//!
//! - **Sequence number** (16-bit, wrapping) — loss shows up as a gap.
//! - **Timestamp** (32-bit) — media clock, typically 90 kHz for video.
//! - **SSRC** (32-bit) — identifies the sender.
//! - **Marker bit** — set on the last packet of an access unit.
//!
//! ## Supported payload formats
//!
//! | Codec | Module | RFC | Handling |
//! |-------|--------|-----|----------|
//! | H.264 | [`h264`] | [RFC 6184](https://tools.ietf.org/html/rfc6184) | Single NAL, STAP-A, FU-A, Annex B in RTP |
//! | AAC | [`aac`] | [RFC 3640](https://tools.ietf.org/html/rfc3640) | One AU per packet, 4-byte AU header section stripped |
//! | Static PTs | [`codec`] | [RFC 3551](https://tools.ietf.org/html/rfc3551) | Payload passed through |

pub mod aac;
pub(crate) mod bits;
pub mod codec;
pub mod h264;
pub mod rtp;
pub mod stream;

use std::fmt;

use crate::error::Result;
use crate::protocol::MediaDescriptor;

pub use codec::CodecParams;
pub use rtp::RtpPacket;
pub use stream::{AccessUnit, Stream};

/// Codec-specific RTP depacketizer.
///
/// One instance lives inside each [`Stream`]. Each supported codec
/// implements this trait, providing:
/// - **Depacketization**: folding one RTP payload into the access unit
///   under construction.
/// - **Codec parameters**: deriving decoder metadata from the media
///   descriptor and whatever parameter sets were seen in-band.
///
/// Timestamp handling and emission are done by [`Stream`], so
/// depacketizers only deal with payload bytes.
pub trait Depacketizer: Send + fmt::Debug {
    /// Consume one RTP payload. Sets `unit.ready` once the payload
    /// completed something worth emitting.
    fn depacketize(&mut self, timestamp: u32, payload: &[u8], unit: &mut UnitBuilder)
    -> Result<()>;

    /// Derive codec metadata. May be called again after
    /// [`parameters_changed`](Self::parameters_changed) to pick up the new
    /// in-band parameters, which also clears the changed state.
    fn codec_params(&mut self, media: &MediaDescriptor) -> Result<CodecParams>;

    /// Every parameter-set slot was replaced by a different value since the
    /// last derivation.
    fn parameters_changed(&self) -> bool {
        false
    }

    /// Enough in-band parameters were seen to attempt derivation.
    fn parameters_available(&self) -> bool {
        false
    }
}

/// The access unit a [`Stream`] is currently assembling.
#[derive(Debug, Default)]
pub struct UnitBuilder {
    pub data: Vec<u8>,
    /// RTP timestamp of the last contribution.
    pub timestamp: u32,
    pub key_frame: bool,
    /// Something complete was added since the last emission.
    pub ready: bool,
}

impl UnitBuilder {
    /// Append one NAL unit in AVCC form (4-byte big-endian length prefix).
    pub fn push_nal(&mut self, timestamp: u32, nal: &[u8], key_frame: bool) {
        self.data.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        self.data.extend_from_slice(nal);
        self.timestamp = timestamp;
        self.key_frame |= key_frame;
        self.ready = true;
    }

    /// Use `payload` as the whole access unit.
    pub fn replace(&mut self, timestamp: u32, payload: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(payload);
        self.timestamp = timestamp;
        self.ready = true;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Pick the depacketizer for a track from its `a=rtpmap` encoding name.
pub fn depacketizer_for(media: &MediaDescriptor) -> Box<dyn Depacketizer> {
    match media.codec_name.to_ascii_uppercase().as_str() {
        "H264" => Box::new(h264::H264Depacketizer::new()),
        "MPEG4-GENERIC" | "AAC" => Box::new(aac::AacDepacketizer::new()),
        _ => Box::new(codec::PassthroughDepacketizer::new()),
    }
}
