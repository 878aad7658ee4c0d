use std::time::Duration;

use tracing::{debug, trace};

use super::codec::{CodecParams, static_payload};
use super::rtp::RtpPacket;
use super::{Depacketizer, UnitBuilder, depacketizer_for};
use crate::error::{Result, RtspError};
use crate::protocol::MediaDescriptor;

/// Clock rate used when neither `a=rtpmap` nor the static table gives one.
pub const DEFAULT_CLOCK_RATE: u32 = 8000;

/// Largest forward step allowed between consecutive presentation times.
pub const DEFAULT_MAX_TIMESTAMP_JUMP: Duration = Duration::from_secs(30 * 60);

/// A complete, decodable media frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// Index of the track in the session's descriptor list.
    pub track: usize,
    /// Codec payload; AVCC length-prefixed NAL units for H.264.
    pub data: Vec<u8>,
    /// Presentation time relative to the first RTP timestamp seen on the track.
    pub time: Duration,
    pub rtp_timestamp: u32,
    pub key_frame: bool,
}

/// Per-track depacketization state.
///
/// Owns the track's [`Depacketizer`], the access unit under construction
/// and the presentation clock. Presentation times are zero-based against
/// the first RTP timestamp observed on the track and must never decrease
/// or jump forward by more than the configured maximum.
#[derive(Debug)]
pub struct Stream {
    track: usize,
    media: MediaDescriptor,
    depacketizer: Box<dyn Depacketizer>,
    codec_params: Option<CodecParams>,
    unit: UnitBuilder,
    first_timestamp: Option<u32>,
    last_time: Duration,
    last_sequence: Option<u16>,
    clock_rate: u32,
    max_jump: Duration,
}

impl Stream {
    pub fn new(track: usize, media: MediaDescriptor) -> Self {
        let depacketizer = depacketizer_for(&media);
        let mut stream = Self {
            track,
            media,
            depacketizer,
            codec_params: None,
            unit: UnitBuilder::default(),
            first_timestamp: None,
            last_time: Duration::ZERO,
            last_sequence: None,
            clock_rate: DEFAULT_CLOCK_RATE,
            max_jump: DEFAULT_MAX_TIMESTAMP_JUMP,
        };
        stream.clock_rate = stream.resolve_clock_rate(DEFAULT_CLOCK_RATE);
        stream
    }

    /// Override the fallback clock rate and the allowed timestamp jump.
    pub fn with_limits(mut self, default_clock_rate: u32, max_jump: Duration) -> Self {
        self.clock_rate = self.resolve_clock_rate(default_clock_rate);
        self.max_jump = max_jump;
        self
    }

    fn resolve_clock_rate(&self, fallback: u32) -> u32 {
        self.media
            .clock_rate
            .or_else(|| static_payload(self.media.payload_type).map(|p| p.clock_rate))
            .filter(|rate| *rate > 0)
            .unwrap_or(fallback.max(1))
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn media(&self) -> &MediaDescriptor {
        &self.media
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    pub fn codec_params(&self) -> Option<&CodecParams> {
        self.codec_params.as_ref()
    }

    pub fn is_codec_ready(&self) -> bool {
        self.codec_params.is_some()
    }

    /// Derive (or re-derive) codec metadata from the descriptor and any
    /// in-band parameter sets. Clears a pending parameter change.
    pub fn derive_codec_params(&mut self) -> Result<&CodecParams> {
        let params = self.depacketizer.codec_params(&self.media)?;
        debug!(track = self.track, codec = params.codec_name(), "codec parameters derived");
        Ok(self.codec_params.insert(params))
    }

    /// Feed one RTP packet; returns an access unit when one completed.
    ///
    /// While a parameter change is pending every packet is rejected with
    /// [`CodecParametersChanged`](RtspError::CodecParametersChanged) and
    /// the completed unit, if any, stays held for [`take_pending`](Self::take_pending).
    pub fn handle_rtp(&mut self, packet: &RtpPacket) -> Result<Option<AccessUnit>> {
        if self.depacketizer.parameters_changed() {
            return Err(RtspError::CodecParametersChanged { track: self.track });
        }

        if let Some(last) = self.last_sequence {
            let expected = last.wrapping_add(1);
            if packet.sequence_number != expected {
                debug!(
                    track = self.track,
                    expected,
                    got = packet.sequence_number,
                    "RTP sequence gap"
                );
            }
        }
        self.last_sequence = Some(packet.sequence_number);
        self.first_timestamp.get_or_insert(packet.timestamp);

        if let Err(e) = self
            .depacketizer
            .depacketize(packet.timestamp, &packet.payload, &mut self.unit)
        {
            self.unit.clear();
            return Err(e);
        }

        if self.codec_params.is_none() && self.depacketizer.parameters_available() {
            if let Err(e) = self.derive_codec_params() {
                debug!(track = self.track, error = %e, "in-band parameters not usable yet");
            }
        }

        self.take_pending()
    }

    /// Emit the completed access unit, if one is waiting.
    pub fn take_pending(&mut self) -> Result<Option<AccessUnit>> {
        if !self.unit.ready {
            return Ok(None);
        }
        if self.depacketizer.parameters_changed() {
            return Err(RtspError::CodecParametersChanged { track: self.track });
        }

        let unit = std::mem::take(&mut self.unit);
        let first = *self.first_timestamp.get_or_insert(unit.timestamp);
        let time = self.presentation_time(unit.timestamp.wrapping_sub(first));

        if time < self.last_time || time - self.last_time > self.max_jump {
            return Err(RtspError::TimestampOutOfOrder {
                track: self.track,
                time,
                last: self.last_time,
            });
        }
        self.last_time = time;

        trace!(
            track = self.track,
            size = unit.data.len(),
            ?time,
            key_frame = unit.key_frame,
            "access unit complete"
        );
        Ok(Some(AccessUnit {
            track: self.track,
            data: unit.data,
            time,
            rtp_timestamp: unit.timestamp,
            key_frame: unit.key_frame,
        }))
    }

    fn presentation_time(&self, ticks: u32) -> Duration {
        Duration::from_nanos(ticks as u64 * 1_000_000_000 / self.clock_rate as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(seq: u16, timestamp: u32, payload: &[u8]) -> RtpPacket {
        RtpPacket {
            version: 2,
            padding: false,
            marker: true,
            payload_type: 96,
            sequence_number: seq,
            timestamp,
            ssrc: 1,
            csrc: vec![],
            extension: None,
            payload: payload.to_vec(),
        }
    }

    fn video() -> MediaDescriptor {
        MediaDescriptor {
            media_type: "video".into(),
            payload_type: 96,
            codec_name: "H264".into(),
            clock_rate: Some(90000),
            ..MediaDescriptor::default()
        }
    }

    #[test]
    fn presentation_time_is_zero_based() {
        let mut s = Stream::new(0, video());
        let first = s.handle_rtp(&packet(1, 1000, &[0x65, 1])).unwrap().unwrap();
        assert_eq!(first.time, Duration::ZERO);
        assert_eq!(first.rtp_timestamp, 1000);
        assert!(first.key_frame);

        let second = s.handle_rtp(&packet(2, 4000, &[0x41, 1])).unwrap().unwrap();
        assert_eq!(second.time, Duration::from_nanos(33_333_333));
        assert!(!second.key_frame);
        assert_eq!(second.data, vec![0, 0, 0, 2, 0x41, 1]);
    }

    #[test]
    fn timestamp_wraparound_stays_monotonic() {
        let mut s = Stream::new(0, video());
        s.handle_rtp(&packet(1, u32::MAX - 1499, &[0x65])).unwrap();
        let unit = s.handle_rtp(&packet(2, 1500, &[0x41])).unwrap().unwrap();
        assert_eq!(unit.time, Duration::from_nanos(3000 * 1_000_000_000 / 90000));
    }

    #[test]
    fn backwards_time_is_rejected() {
        let mut s = Stream::new(3, video());
        s.handle_rtp(&packet(1, 1000, &[0x65])).unwrap();
        s.handle_rtp(&packet(2, 7000, &[0x41])).unwrap();
        let err = s.handle_rtp(&packet(3, 2000, &[0x41])).unwrap_err();
        assert!(matches!(err, RtspError::TimestampOutOfOrder { track: 3, .. }));

        // watermark unchanged: a later frame is still accepted
        let unit = s.handle_rtp(&packet(4, 10000, &[0x41])).unwrap().unwrap();
        assert_eq!(unit.time, Duration::from_millis(100));
    }

    #[test]
    fn large_forward_jump_is_rejected() {
        let mut s = Stream::new(0, video()).with_limits(8000, Duration::from_secs(1));
        s.handle_rtp(&packet(1, 0, &[0x65])).unwrap();
        assert!(matches!(
            s.handle_rtp(&packet(2, 180_000, &[0x41])),
            Err(RtspError::TimestampOutOfOrder { .. })
        ));
    }

    #[test]
    fn clock_rate_resolution() {
        assert_eq!(Stream::new(0, video()).clock_rate(), 90000);

        let pcma = MediaDescriptor {
            payload_type: 8,
            ..MediaDescriptor::default()
        };
        assert_eq!(Stream::new(0, pcma).clock_rate(), 8000);

        let unknown = MediaDescriptor {
            payload_type: 100,
            codec_name: "X-CUSTOM".into(),
            ..MediaDescriptor::default()
        };
        assert_eq!(Stream::new(0, unknown.clone()).clock_rate(), DEFAULT_CLOCK_RATE);
        assert_eq!(
            Stream::new(0, unknown).with_limits(48000, DEFAULT_MAX_TIMESTAMP_JUMP).clock_rate(),
            48000
        );
    }

    #[test]
    fn in_band_parameters_make_stream_ready() {
        let mut s = Stream::new(0, video());
        assert!(!s.is_codec_ready());
        s.handle_rtp(&packet(1, 0, &hex::decode("6764002aac2c6a81e0089f966e0202020400").unwrap()))
            .unwrap();
        assert!(!s.is_codec_ready());
        s.handle_rtp(&packet(2, 0, &[0x68, 0xee, 0x3c, 0xb0, 0x00])).unwrap();
        assert!(s.is_codec_ready());
        assert!(matches!(s.codec_params(), Some(CodecParams::H264(p)) if p.width == 1920));
    }

    #[test]
    fn parameter_change_holds_unit_until_rederived() {
        let sps_a = hex::decode("6764002aac2c6a81e0089f966e0202020400").unwrap();
        let sps_b = hex::decode("6742c01fda014016e84000000300400000078f1832a0").unwrap();
        let mut s = Stream::new(0, video());
        s.handle_rtp(&packet(1, 0, &sps_a)).unwrap();
        s.handle_rtp(&packet(2, 0, &[0x68, 0xee, 0x3c, 0xb0, 0x00])).unwrap();
        assert!(s.is_codec_ready());

        // new SPS + PPS + IDR in one STAP-A
        let mut stap = vec![0x78];
        for nal in [&sps_b[..], &[0x68, 0xce, 0x06, 0xe2], &[0x65, 0x01]] {
            stap.extend_from_slice(&(nal.len() as u16).to_be_bytes());
            stap.extend_from_slice(nal);
        }
        assert!(matches!(
            s.handle_rtp(&packet(3, 3000, &stap)),
            Err(RtspError::CodecParametersChanged { track: 0 })
        ));
        assert!(matches!(
            s.handle_rtp(&packet(4, 6000, &[0x41])),
            Err(RtspError::CodecParametersChanged { .. })
        ));

        let CodecParams::H264(params) = s.derive_codec_params().unwrap() else {
            panic!("expected H.264 params");
        };
        assert_eq!(params.height, 720);

        let held = s.take_pending().unwrap().unwrap();
        assert_eq!(held.rtp_timestamp, 3000);
        assert!(held.key_frame);
        assert!(s.take_pending().unwrap().is_none());
    }

    #[test]
    fn depacketize_error_discards_partial_unit() {
        let mut s = Stream::new(0, video());
        // slice followed by a type-30 unit inside one STAP-A
        let stap = [0x78, 0, 2, 0x41, 1, 0, 1, 0x1e];
        assert!(matches!(
            s.handle_rtp(&packet(1, 0, &stap)),
            Err(RtspError::UnsupportedNaluType(30))
        ));
        assert!(s.take_pending().unwrap().is_none());
    }
}
