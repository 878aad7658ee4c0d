use tracing::{debug, info, trace};

use super::bits::{BitReader, unescape_rbsp};
use super::codec::CodecParams;
use super::{Depacketizer, UnitBuilder};
use crate::error::{Result, RtspError};
use crate::protocol::MediaDescriptor;

const NAL_IDR: u8 = 5;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;
const NAL_STAP_A: u8 = 24;
const NAL_FU_A: u8 = 28;

const ANNEX_B_START: [u8; 4] = [0, 0, 0, 1];

/// H.264 RTP depacketizer (RFC 6184).
///
/// Reassembles H.264 access units from RTP payloads and emits them in AVCC
/// form (every NAL unit prefixed with its 4-byte big-endian length).
/// Handled payload structures:
///
/// - **Single NAL Unit** (§5.6), types 1–23: slices (1–5) are appended to
///   the access unit, type 5 (IDR) marks it as a key frame; SPS (7) and
///   PPS (8) are stored as codec parameters.
///
/// - **STAP-A** (§5.7.1), type 24: aggregated NAL units, each prefixed
///   with a 16-bit size.
///
///   ```text
///   [STAP-A hdr][size16][NAL 1][size16][NAL 2]...
///   ```
///
/// - **FU-A** (§5.8), type 28: one NAL unit split across packets:
///
///   ```text
///   FU indicator:  [F|NRI|Type=28]     (1 byte)
///   FU header:     [S|E|R|NAL_Type]    (1 byte)
///   Fragment data: [...]
///   ```
///
///   The reconstructed NAL header is the indicator's F/NRI bits with the
///   FU header's type. Fragments that arrive without a started unit are
///   dropped.
///
/// Some servers put Annex B streams (`00 00 00 01`-delimited) straight into
/// RTP payloads; those are split with [`extract_nal_units`] and every piece
/// goes through the same handling.
///
/// Nested structures are flattened with an explicit work list, so a packet
/// never recurses regardless of how its units are packed.
#[derive(Debug, Default)]
pub struct H264Depacketizer {
    /// FU-A reassembly buffer, starting with the reconstructed NAL header.
    fragment: Option<Vec<u8>>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
    sps_changed: bool,
    pps_changed: bool,
}

impl H264Depacketizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sps(&self) -> Option<&[u8]> {
        self.sps.as_deref()
    }

    pub fn pps(&self) -> Option<&[u8]> {
        self.pps.as_deref()
    }

    /// Handle one NAL-level unit. Units produced by unpacking it are pushed
    /// onto `work` in reverse so they pop off in stream order.
    fn handle_nal(
        &mut self,
        timestamp: u32,
        nal: Vec<u8>,
        unit: &mut UnitBuilder,
        work: &mut Vec<Vec<u8>>,
    ) -> Result<()> {
        if nal.is_empty() {
            return Err(RtspError::truncated(1, 0));
        }

        if nal.starts_with(&ANNEX_B_START) {
            let nals = extract_nal_units(&nal);
            trace!(count = nals.len(), "Annex B stream inside RTP payload");
            work.extend(nals.into_iter().rev().map(<[u8]>::to_vec));
            return Ok(());
        }

        let nal_type = nal[0] & 0x1f;
        match nal_type {
            1..=5 => unit.push_nal(timestamp, &nal, nal_type == NAL_IDR),
            NAL_SPS => store_parameter_set("SPS", &mut self.sps, &mut self.sps_changed, nal),
            NAL_PPS => store_parameter_set("PPS", &mut self.pps, &mut self.pps_changed, nal),
            NAL_STAP_A => {
                let mut members = Vec::new();
                let mut rest = &nal[1..];
                while rest.len() >= 2 {
                    let size = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                    if size + 2 > rest.len() {
                        trace!(size, remaining = rest.len() - 2, "STAP-A unit overruns packet");
                        break;
                    }
                    if size > 0 {
                        members.push(rest[2..2 + size].to_vec());
                    }
                    rest = &rest[2 + size..];
                }
                work.extend(members.into_iter().rev());
            }
            NAL_FU_A => {
                if nal.len() < 2 {
                    return Err(RtspError::truncated(2, nal.len()));
                }
                let (indicator, header) = (nal[0], nal[1]);
                let start = header & 0x80 != 0;
                let end = header & 0x40 != 0;

                if start {
                    if self.fragment.is_some() {
                        trace!("FU-A start before previous unit ended, discarding it");
                    }
                    self.fragment = Some(vec![(indicator & 0xe0) | (header & 0x1f)]);
                }
                let Some(buffer) = self.fragment.as_mut() else {
                    trace!("dropping FU-A fragment without a start");
                    return Ok(());
                };
                buffer.extend_from_slice(&nal[2..]);
                if end {
                    if let Some(complete) = self.fragment.take() {
                        work.push(complete);
                    }
                }
            }
            // SEI, delimiters, fillers, reserved, STAP-B/MTAP
            6 | 9..=23 | 25..=27 => {}
            other => return Err(RtspError::UnsupportedNaluType(other)),
        }
        Ok(())
    }

    /// Fill empty parameter-set slots from the descriptor's out-of-band
    /// sources: `sprop-parameter-sets` first, then an Annex B `config` blob.
    fn bootstrap(&mut self, media: &MediaDescriptor) {
        let mut scratch = UnitBuilder::default();
        for nal in &media.sprop_parameter_sets {
            if let Err(e) = self.depacketize(0, nal, &mut scratch) {
                debug!(error = %e, "ignoring unusable sprop-parameter-sets entry");
            }
        }
        if self.sps.is_some() && self.pps.is_some() {
            return;
        }
        for nal in extract_nal_units(&media.config) {
            if let Err(e) = self.depacketize(0, nal, &mut scratch) {
                debug!(error = %e, "ignoring unusable config entry");
            }
        }
    }
}

fn store_parameter_set(name: &str, slot: &mut Option<Vec<u8>>, changed: &mut bool, nal: Vec<u8>) {
    if slot.is_none() {
        debug!(size = nal.len(), "H.264 {name} captured");
    } else if slot.as_deref() != Some(nal.as_slice()) {
        info!(size = nal.len(), "H.264 {name} changed");
        *changed = true;
    } else {
        return;
    }
    *slot = Some(nal);
}

impl Depacketizer for H264Depacketizer {
    fn depacketize(
        &mut self,
        timestamp: u32,
        payload: &[u8],
        unit: &mut UnitBuilder,
    ) -> Result<()> {
        let mut work = vec![payload.to_vec()];
        while let Some(nal) = work.pop() {
            self.handle_nal(timestamp, nal, unit, &mut work)?;
        }
        Ok(())
    }

    fn codec_params(&mut self, media: &MediaDescriptor) -> Result<CodecParams> {
        if self.sps.is_none() || self.pps.is_none() {
            self.bootstrap(media);
        }
        let (Some(sps), Some(pps)) = (&self.sps, &self.pps) else {
            return Err(RtspError::MissingParameterSets(format!(
                "H264 track {:?} has no SPS/PPS",
                media.control
            )));
        };
        let params = H264Params::from_parameter_sets(sps, pps)?;
        self.sps_changed = false;
        self.pps_changed = false;
        Ok(CodecParams::H264(params))
    }

    fn parameters_changed(&self) -> bool {
        self.sps_changed && self.pps_changed
    }

    fn parameters_available(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }
}

/// Extract NAL units from an H.264 Annex B bitstream.
///
/// Scans for start codes (both 4-byte `00 00 00 01` and 3-byte
/// `00 00 01`) and returns the NAL data between them, excluding
/// the start codes themselves.
///
/// The start code length is tracked per-NAL to ensure boundaries
/// between adjacent NALs are computed correctly when mixed 3-byte
/// and 4-byte start codes appear.
pub fn extract_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut i = 0usize;

    // (nal_data_start_index, start_code_length)
    let mut start_entries: Vec<(usize, usize)> = Vec::new();

    while i < data.len() {
        if i + 3 < data.len() && data[i..i + 4] == ANNEX_B_START {
            start_entries.push((i + 4, 4));
            i += 4;
        } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
            start_entries.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    start_entries
        .iter()
        .enumerate()
        .filter_map(|(idx, &(start, _))| {
            let end = match start_entries.get(idx + 1) {
                Some(&(next_start, next_sc_len)) => next_start - next_sc_len,
                None => data.len(),
            };
            (start < end).then(|| &data[start..end])
        })
        .collect()
}

/// Decoder metadata for an H.264 track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264Params {
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

impl H264Params {
    /// Build from raw SPS and PPS NAL units (including their header byte).
    pub fn from_parameter_sets(sps: &[u8], pps: &[u8]) -> Result<Self> {
        if sps.len() < 4 {
            return Err(RtspError::InvalidCodecConfig(format!(
                "SPS too short ({} bytes)",
                sps.len()
            )));
        }
        if pps.is_empty() {
            return Err(RtspError::InvalidCodecConfig("empty PPS".into()));
        }
        let (width, height) = sps_dimensions(sps)?;
        Ok(Self {
            profile_idc: sps[1],
            constraint_flags: sps[2],
            level_idc: sps[3],
            width,
            height,
            sps: sps.to_vec(),
            pps: pps.to_vec(),
        })
    }

    /// `profile-level-id` as it appears in SDP (RFC 6184 §8.1).
    pub fn profile_level_id(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}",
            self.profile_idc, self.constraint_flags, self.level_idc
        )
    }

    /// RFC 6381 codec string, e.g. `avc1.64002a`.
    pub fn rfc6381_codec(&self) -> String {
        format!("avc1.{}", self.profile_level_id())
    }

    /// AVCDecoderConfigurationRecord (ISO/IEC 14496-15 §5.2.4.1) with one
    /// SPS, one PPS and 4-byte NAL lengths.
    pub fn decoder_config_record(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(11 + self.sps.len() + self.pps.len());
        out.extend_from_slice(&[
            1,
            self.profile_idc,
            self.constraint_flags,
            self.level_idc,
            0xff, // lengthSizeMinusOne = 3
            0xe1, // one SPS
        ]);
        out.extend_from_slice(&(self.sps.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.sps);
        out.push(1);
        out.extend_from_slice(&(self.pps.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.pps);
        out
    }
}

/// Profiles whose SPS carries chroma format and bit depth fields.
const HIGH_PROFILES: [u8; 13] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135];

/// Luma width and height from an SPS NAL (ITU-T H.264 §7.3.2.1.1).
fn sps_dimensions(sps: &[u8]) -> Result<(u32, u32)> {
    let rbsp = unescape_rbsp(sps);
    if rbsp.len() < 4 {
        return Err(RtspError::InvalidCodecConfig("SPS too short".into()));
    }
    let profile_idc = rbsp[1];
    let mut r = BitReader::new(&rbsp[4..]);

    r.read_ue()?; // seq_parameter_set_id
    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    if HIGH_PROFILES.contains(&profile_idc) {
        chroma_format_idc = r.read_ue()?;
        if chroma_format_idc == 3 {
            separate_colour_plane = r.read_bit()?;
        }
        r.read_ue()?; // bit_depth_luma_minus8
        r.read_ue()?; // bit_depth_chroma_minus8
        r.read_bit()?; // qpprime_y_zero_transform_bypass_flag
        if r.read_bit()? {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..lists {
                if r.read_bit()? {
                    skip_scaling_list(&mut r, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    r.read_ue()?; // log2_max_frame_num_minus4
    match r.read_ue()? {
        0 => {
            r.read_ue()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            r.read_bit()?; // delta_pic_order_always_zero_flag
            r.read_se()?;
            r.read_se()?;
            for _ in 0..r.read_ue()? {
                r.read_se()?;
            }
        }
        _ => {}
    }
    r.read_ue()?; // max_num_ref_frames
    r.read_bit()?; // gaps_in_frame_num_value_allowed_flag

    let width_mbs = r.read_ue()? as u64 + 1;
    let height_map_units = r.read_ue()? as u64 + 1;
    let frame_mbs_only = r.read_bit()?;
    if !frame_mbs_only {
        r.read_bit()?; // mb_adaptive_frame_field_flag
    }
    r.read_bit()?; // direct_8x8_inference_flag

    let field_factor = if frame_mbs_only { 1 } else { 2 };
    let mut width = width_mbs * 16;
    let mut height = field_factor * height_map_units * 16;

    if r.read_bit()? {
        let (left, right, top, bottom) = (
            r.read_ue()? as u64,
            r.read_ue()? as u64,
            r.read_ue()? as u64,
            r.read_ue()? as u64,
        );
        let (crop_x, crop_y) = if separate_colour_plane || chroma_format_idc == 0 {
            (1, field_factor)
        } else {
            match chroma_format_idc {
                1 => (2, 2 * field_factor),
                2 => (2, field_factor),
                _ => (1, field_factor),
            }
        };
        width = width
            .checked_sub((left + right) * crop_x)
            .ok_or_else(|| RtspError::InvalidCodecConfig("SPS crop exceeds width".into()))?;
        height = height
            .checked_sub((top + bottom) * crop_y)
            .ok_or_else(|| RtspError::InvalidCodecConfig("SPS crop exceeds height".into()))?;
    }

    let to_u32 = |v: u64| {
        u32::try_from(v).map_err(|_| RtspError::InvalidCodecConfig("SPS dimension overflow".into()))
    };
    Ok((to_u32(width)?, to_u32(height)?))
}

fn skip_scaling_list(r: &mut BitReader<'_>, size: usize) -> Result<()> {
    let mut last = 8i64;
    let mut next = 8i64;
    for _ in 0..size {
        if next != 0 {
            next = (last + i64::from(r.read_se()?)).rem_euclid(256);
        }
        if next != 0 {
            last = next;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS_1080P: &str = "6764002aac2c6a81e0089f966e0202020400";
    const SPS_720P: &str = "6742c01fda014016e84000000300400000078f1832a0";
    const PPS: [u8; 5] = [0x68, 0xee, 0x3c, 0xb0, 0x00];

    fn feed(d: &mut H264Depacketizer, payload: &[u8]) -> UnitBuilder {
        let mut unit = UnitBuilder::default();
        d.depacketize(1000, payload, &mut unit).unwrap();
        unit
    }

    // --- NAL extraction ---

    #[test]
    fn extract_single_nal_4byte_sc() {
        let data = [0, 0, 0, 1, 0x65, 0xAA, 0xBB];
        assert_eq!(extract_nal_units(&data), vec![&[0x65, 0xAA, 0xBB][..]]);
    }

    #[test]
    fn extract_mixed_start_codes() {
        let mut data = vec![0, 0, 0, 1, 0x67, 0x42];
        data.extend_from_slice(&[0, 0, 1, 0x68, 0xCE]);
        let nals = extract_nal_units(&data);
        assert_eq!(nals, vec![&[0x67, 0x42][..], &[0x68, 0xCE][..]]);
    }

    #[test]
    fn extract_no_start_code() {
        assert!(extract_nal_units(&[]).is_empty());
        assert!(extract_nal_units(&[0xFF, 0xFE]).is_empty());
    }

    // --- Depacketization ---

    #[test]
    fn single_idr_slice_is_key_frame() {
        let mut d = H264Depacketizer::new();
        let unit = feed(&mut d, &[0x65, 0xAA, 0xBB]);
        assert!(unit.ready);
        assert!(unit.key_frame);
        assert_eq!(unit.timestamp, 1000);
        assert_eq!(unit.data, vec![0, 0, 0, 3, 0x65, 0xAA, 0xBB]);
    }

    #[test]
    fn non_idr_slice_is_not_key_frame() {
        let mut d = H264Depacketizer::new();
        let unit = feed(&mut d, &[0x41, 0x01]);
        assert!(unit.ready);
        assert!(!unit.key_frame);
    }

    #[test]
    fn fu_a_reassembles_original_nal() {
        let mut original = vec![0x65];
        original.extend((0..200).map(|i| i as u8));

        let indicator = (original[0] & 0xe0) | NAL_FU_A;
        let chunks: Vec<&[u8]> = original[1..].chunks(70).collect();
        let mut d = H264Depacketizer::new();
        let mut unit = UnitBuilder::default();
        for (i, chunk) in chunks.iter().enumerate() {
            let mut header = original[0] & 0x1f;
            if i == 0 {
                header |= 0x80;
            }
            if i == chunks.len() - 1 {
                header |= 0x40;
            }
            let mut payload = vec![indicator, header];
            payload.extend_from_slice(chunk);
            d.depacketize(3000, &payload, &mut unit).unwrap();
            assert_eq!(unit.ready, i == chunks.len() - 1);
        }

        let mut expected = (original.len() as u32).to_be_bytes().to_vec();
        expected.extend_from_slice(&original);
        assert_eq!(unit.data, expected);
        assert!(unit.key_frame);
    }

    #[test]
    fn fu_a_without_start_is_dropped() {
        let mut d = H264Depacketizer::new();
        let unit = feed(&mut d, &[0x7C, 0x45, 1, 2, 3]);
        assert!(!unit.ready);
        assert!(unit.data.is_empty());
    }

    #[test]
    fn short_fu_a_is_truncated() {
        let mut d = H264Depacketizer::new();
        let mut unit = UnitBuilder::default();
        assert!(matches!(
            d.depacketize(0, &[0x7C], &mut unit),
            Err(RtspError::TruncatedPacket { needed: 2, available: 1 })
        ));
    }

    #[test]
    fn stap_a_members_in_order() {
        let mut d = H264Depacketizer::new();
        let unit = feed(&mut d, &[0x78, 0, 3, 0x65, 1, 2, 0, 2, 0x41, 9]);
        assert_eq!(
            unit.data,
            vec![0, 0, 0, 3, 0x65, 1, 2, 0, 0, 0, 2, 0x41, 9]
        );
        assert!(unit.key_frame);
    }

    #[test]
    fn stap_a_overrun_stops_parsing() {
        let mut d = H264Depacketizer::new();
        let unit = feed(&mut d, &[0x78, 0, 2, 0x41, 1, 0, 9, 0x41]);
        assert_eq!(unit.data, vec![0, 0, 0, 2, 0x41, 1]);
    }

    #[test]
    fn stap_a_carries_parameter_sets() {
        let sps = hex::decode(SPS_1080P).unwrap();
        let mut payload = vec![0x78];
        payload.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        payload.extend_from_slice(&sps);
        payload.extend_from_slice(&(PPS.len() as u16).to_be_bytes());
        payload.extend_from_slice(&PPS);

        let mut d = H264Depacketizer::new();
        let unit = feed(&mut d, &payload);
        assert!(!unit.ready);
        assert_eq!(d.sps(), Some(&sps[..]));
        assert_eq!(d.pps(), Some(&PPS[..]));
        assert!(d.parameters_available());
        assert!(!d.parameters_changed());
    }

    #[test]
    fn annex_b_payload_is_split() {
        let mut payload = vec![0, 0, 0, 1];
        payload.extend_from_slice(&hex::decode(SPS_1080P).unwrap());
        payload.extend_from_slice(&[0, 0, 0, 1]);
        payload.extend_from_slice(&PPS);
        payload.extend_from_slice(&[0, 0, 0, 1, 0x65, 0xAB]);

        let mut d = H264Depacketizer::new();
        let unit = feed(&mut d, &payload);
        assert!(d.parameters_available());
        assert_eq!(unit.data, vec![0, 0, 0, 2, 0x65, 0xAB]);
        assert!(unit.key_frame);
    }

    #[test]
    fn ignored_types_produce_nothing() {
        let mut d = H264Depacketizer::new();
        for nal_type in [6u8, 9, 12, 23, 25, 27] {
            let unit = feed(&mut d, &[nal_type, 0x00]);
            assert!(!unit.ready, "type {nal_type}");
        }
    }

    #[test]
    fn unsupported_types_fail() {
        let mut d = H264Depacketizer::new();
        let mut unit = UnitBuilder::default();
        for nal_type in [0u8, 29, 30, 31] {
            assert!(matches!(
                d.depacketize(0, &[nal_type, 0], &mut unit),
                Err(RtspError::UnsupportedNaluType(t)) if t == nal_type
            ));
        }
    }

    #[test]
    fn change_requires_both_parameter_sets() {
        let sps = hex::decode(SPS_1080P).unwrap();
        let sps2 = hex::decode(SPS_720P).unwrap();
        let mut d = H264Depacketizer::new();
        feed(&mut d, &sps);
        feed(&mut d, &PPS);
        feed(&mut d, &sps);
        assert!(!d.parameters_changed());

        feed(&mut d, &sps2);
        assert!(!d.parameters_changed());
        feed(&mut d, &[0x68, 0xce, 0x06, 0xe2]);
        assert!(d.parameters_changed());

        let params = d.codec_params(&MediaDescriptor::default()).unwrap();
        assert!(!d.parameters_changed());
        let CodecParams::H264(params) = params else {
            panic!("expected H.264 params");
        };
        assert_eq!((params.width, params.height), (1280, 720));
    }

    // --- Codec parameters ---

    #[test]
    fn params_from_sprop_parameter_sets() {
        let media = MediaDescriptor {
            codec_name: "H264".into(),
            sprop_parameter_sets: vec![hex::decode(SPS_1080P).unwrap(), PPS.to_vec()],
            ..MediaDescriptor::default()
        };
        let mut d = H264Depacketizer::new();
        let CodecParams::H264(params) = d.codec_params(&media).unwrap() else {
            panic!("expected H.264 params");
        };
        assert_eq!(params.profile_idc, 100);
        assert_eq!(params.level_idc, 42);
        assert_eq!((params.width, params.height), (1920, 1080));
        assert_eq!(params.profile_level_id(), "64002a");
        assert_eq!(params.rfc6381_codec(), "avc1.64002a");

        let record = params.decoder_config_record();
        assert_eq!(&record[..6], &[1, 100, 0, 42, 0xff, 0xe1]);
        assert_eq!(record.len(), 11 + params.sps.len() + params.pps.len());
    }

    #[test]
    fn params_from_annex_b_config() {
        let mut config = vec![0, 0, 0, 1];
        config.extend_from_slice(&hex::decode(SPS_720P).unwrap());
        config.extend_from_slice(&[0, 0, 1]);
        config.extend_from_slice(&PPS);
        let media = MediaDescriptor {
            config,
            ..MediaDescriptor::default()
        };
        let mut d = H264Depacketizer::new();
        let CodecParams::H264(params) = d.codec_params(&media).unwrap() else {
            panic!("expected H.264 params");
        };
        assert_eq!(params.profile_idc, 66);
        assert_eq!((params.width, params.height), (1280, 720));
    }

    #[test]
    fn missing_parameter_sets() {
        let mut d = H264Depacketizer::new();
        assert!(matches!(
            d.codec_params(&MediaDescriptor::default()),
            Err(RtspError::MissingParameterSets(_))
        ));
    }

    #[test]
    fn truncated_sps_is_invalid() {
        assert!(matches!(
            H264Params::from_parameter_sets(&[0x67, 0x64, 0x00, 0x2a, 0xac], &PPS),
            Err(RtspError::InvalidCodecConfig(_))
        ));
    }

    #[test]
    fn extreme_scaling_delta_is_rejected_not_overflowed() {
        // High profile, scaling matrix present, first list with
        // delta_scale = se(ue 2^32-3) = i32::MAX, then the stream ends.
        let sps = [
            0x67, 0x64, 0x00, 0x2a, 0xad, 0x80, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xfe, 0x80,
        ];
        assert!(matches!(
            H264Params::from_parameter_sets(&sps, &PPS),
            Err(RtspError::InvalidCodecConfig(_))
        ));

        let mut d = H264Depacketizer::new();
        feed(&mut d, &sps);
        feed(&mut d, &PPS);
        assert!(d.parameters_available());
        assert!(d.codec_params(&MediaDescriptor::default()).is_err());
    }
}
