//! Codec metadata and the RFC 3551 static payload-type table.

use super::aac::AacConfig;
use super::h264::H264Params;
use super::{Depacketizer, UnitBuilder};
use crate::error::{Result, RtspError};
use crate::protocol::MediaDescriptor;

/// First payload type of the dynamic range (RFC 3551 §6).
pub const DYNAMIC_PAYLOAD_TYPE_START: u8 = 96;

/// Decoder metadata for one track.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecParams {
    H264(H264Params),
    Aac(AacConfig),
    /// A fixed payload type from the static table.
    Static(StaticPayload),
    /// A dynamic payload type with no dedicated depacketizer; payloads are
    /// delivered untouched.
    Passthrough { codec_name: String, payload_type: u8 },
}

impl CodecParams {
    pub fn codec_name(&self) -> &str {
        match self {
            CodecParams::H264(_) => "H264",
            CodecParams::Aac(_) => "MPEG4-GENERIC",
            CodecParams::Static(payload) => payload.encoding,
            CodecParams::Passthrough { codec_name, .. } => codec_name,
        }
    }
}

/// One row of the RFC 3551 §6 payload-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPayload {
    pub payload_type: u8,
    pub encoding: &'static str,
    pub clock_rate: u32,
    /// 0 for video.
    pub channels: u16,
}

const fn row(payload_type: u8, encoding: &'static str, clock_rate: u32, channels: u16) -> StaticPayload {
    StaticPayload {
        payload_type,
        encoding,
        clock_rate,
        channels,
    }
}

static STATIC_PAYLOADS: [StaticPayload; 24] = [
    row(0, "PCMU", 8000, 1),
    row(3, "GSM", 8000, 1),
    row(4, "G723", 8000, 1),
    row(5, "DVI4", 8000, 1),
    row(6, "DVI4", 16000, 1),
    row(7, "LPC", 8000, 1),
    row(8, "PCMA", 8000, 1),
    row(9, "G722", 8000, 1),
    row(10, "L16", 44100, 2),
    row(11, "L16", 44100, 1),
    row(12, "QCELP", 8000, 1),
    row(13, "CN", 8000, 1),
    row(14, "MPA", 90000, 1),
    row(15, "G728", 8000, 1),
    row(16, "DVI4", 11025, 1),
    row(17, "DVI4", 22050, 1),
    row(18, "G729", 8000, 1),
    row(25, "CelB", 90000, 0),
    row(26, "JPEG", 90000, 0),
    row(28, "nv", 90000, 0),
    row(31, "H261", 90000, 0),
    row(32, "MPV", 90000, 0),
    row(33, "MP2T", 90000, 0),
    row(34, "H263", 90000, 0),
];

/// Look up a statically assigned payload type.
pub fn static_payload(payload_type: u8) -> Option<StaticPayload> {
    STATIC_PAYLOADS
        .iter()
        .find(|p| p.payload_type == payload_type)
        .copied()
}

/// Depacketizer for codecs without payload structure: each RTP payload is
/// one access unit.
#[derive(Debug, Default)]
pub struct PassthroughDepacketizer;

impl PassthroughDepacketizer {
    pub fn new() -> Self {
        Self
    }
}

impl Depacketizer for PassthroughDepacketizer {
    fn depacketize(
        &mut self,
        timestamp: u32,
        payload: &[u8],
        unit: &mut UnitBuilder,
    ) -> Result<()> {
        unit.replace(timestamp, payload);
        Ok(())
    }

    fn codec_params(&mut self, media: &MediaDescriptor) -> Result<CodecParams> {
        let payload_type = media.payload_type;
        if payload_type >= DYNAMIC_PAYLOAD_TYPE_START {
            return Ok(CodecParams::Passthrough {
                codec_name: media.codec_name.clone(),
                payload_type,
            });
        }
        static_payload(payload_type)
            .map(CodecParams::Static)
            .ok_or(RtspError::UnsupportedPayloadType(payload_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(payload_type: u8, codec_name: &str) -> MediaDescriptor {
        MediaDescriptor {
            payload_type,
            codec_name: codec_name.to_string(),
            ..MediaDescriptor::default()
        }
    }

    #[test]
    fn static_table_lookup() {
        let pcmu = static_payload(0).unwrap();
        assert_eq!((pcmu.encoding, pcmu.clock_rate, pcmu.channels), ("PCMU", 8000, 1));
        assert_eq!(static_payload(8).unwrap().encoding, "PCMA");
        assert_eq!(static_payload(26).unwrap().clock_rate, 90000);
        assert!(static_payload(19).is_none());
        assert!(static_payload(35).is_none());
        assert!(static_payload(96).is_none());
    }

    #[test]
    fn static_payload_type_gets_table_metadata() {
        let mut d = PassthroughDepacketizer::new();
        let params = d.codec_params(&media(8, "")).unwrap();
        assert_eq!(params.codec_name(), "PCMA");
    }

    #[test]
    fn unknown_static_payload_type_fails() {
        let mut d = PassthroughDepacketizer::new();
        assert!(matches!(
            d.codec_params(&media(72, "")),
            Err(RtspError::UnsupportedPayloadType(72))
        ));
    }

    #[test]
    fn dynamic_payload_type_passes_through() {
        let mut d = PassthroughDepacketizer::new();
        let params = d.codec_params(&media(98, "opus")).unwrap();
        assert_eq!(
            params,
            CodecParams::Passthrough {
                codec_name: "opus".into(),
                payload_type: 98
            }
        );

        let mut unit = UnitBuilder::default();
        d.depacketize(7, &[1, 2, 3], &mut unit).unwrap();
        assert_eq!(unit.data, vec![1, 2, 3]);
        assert!(unit.ready);
    }
}
