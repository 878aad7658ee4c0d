use super::bits::BitReader;
use super::codec::CodecParams;
use super::{Depacketizer, UnitBuilder};
use crate::error::{Result, RtspError};
use crate::protocol::MediaDescriptor;

/// AU-headers-length (16 bits) plus one AU header (13-bit size, 3-bit index).
const AU_HEADER_SECTION_LEN: usize = 4;

/// Sampling frequencies by `samplingFrequencyIndex` (ISO/IEC 14496-3 §1.6.3.4).
const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// AAC RTP depacketizer (RFC 3640, `mode=AAC-hbr`).
///
/// Each packet is expected to carry exactly one access unit behind a
/// single 4-byte AU header section, which is stripped:
///
/// ```text
/// [AU-headers-length=16][AU-size(13)|AU-index(3)][raw AAC frame]
/// ```
#[derive(Debug, Default)]
pub struct AacDepacketizer;

impl AacDepacketizer {
    pub fn new() -> Self {
        Self
    }
}

impl Depacketizer for AacDepacketizer {
    fn depacketize(
        &mut self,
        timestamp: u32,
        payload: &[u8],
        unit: &mut UnitBuilder,
    ) -> Result<()> {
        let frame = payload
            .get(AU_HEADER_SECTION_LEN..)
            .ok_or_else(|| RtspError::truncated(AU_HEADER_SECTION_LEN, payload.len()))?;
        unit.replace(timestamp, frame);
        Ok(())
    }

    fn codec_params(&mut self, media: &MediaDescriptor) -> Result<CodecParams> {
        if media.config.is_empty() {
            return Err(RtspError::MissingParameterSets(format!(
                "AAC track {:?} has no config",
                media.control
            )));
        }
        Ok(CodecParams::Aac(AacConfig::parse(&media.config)?))
    }
}

/// Decoded MPEG-4 AudioSpecificConfig (ISO/IEC 14496-3 §1.6.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacConfig {
    /// Audio object type; 2 is AAC-LC.
    pub object_type: u8,
    pub sample_rate: u32,
    pub channel_config: u8,
    /// The config bytes as carried in SDP.
    pub raw: Vec<u8>,
}

impl AacConfig {
    pub fn parse(config: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(config);

        let mut object_type = r.read_bits(5)? as u8;
        if object_type == 31 {
            object_type = 32 + r.read_bits(6)? as u8;
        }

        let frequency_index = r.read_bits(4)? as usize;
        let sample_rate = if frequency_index == 15 {
            r.read_bits(24)?
        } else {
            *SAMPLE_RATES.get(frequency_index).ok_or_else(|| {
                RtspError::InvalidCodecConfig(format!(
                    "reserved AAC sampling frequency index {frequency_index}"
                ))
            })?
        };

        let channel_config = r.read_bits(4)? as u8;

        Ok(Self {
            object_type,
            sample_rate,
            channel_config,
            raw: config.to_vec(),
        })
    }

    /// RFC 6381 codec string, e.g. `mp4a.40.2`.
    pub fn rfc6381_codec(&self) -> String {
        format!("mp4a.40.{}", self.object_type)
    }
}
