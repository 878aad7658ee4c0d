/// Protocol version carried in the top two bits of every RTP packet.
pub const RTP_VERSION: u8 = 2;

const FIXED_HEADER_LEN: usize = 12;

/// RTP header extension (RFC 3550 §5.3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpExtension {
    /// Profile-defined 16-bit identifier.
    pub profile: u16,
    /// Extension body; always a multiple of 4 bytes.
    pub data: Vec<u8>,
}

/// A parsed RTP packet (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |                   CSRC identifiers (CC × 32 bits)             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  extension profile (X=1)      |   extension length (words)    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Everything after the header (and extension) is payload. Padding bytes,
/// when the P bit is set, are left in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    /// Present exactly when the X bit was set.
    pub extension: Option<RtpExtension>,
    pub payload: Vec<u8>,
}

fn field(buf: &[u8], start: usize, len: usize) -> crate::Result<&[u8]> {
    buf.get(start..start + len)
        .ok_or_else(|| crate::RtspError::truncated(start + len, buf.len()))
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl RtpPacket {
    /// Decode one RTP packet from a complete interleaved frame payload.
    ///
    /// Fails with [`UnsupportedRtpVersion`](crate::RtspError::UnsupportedRtpVersion)
    /// when the version bits are not 2 and with
    /// [`TruncatedPacket`](crate::RtspError::TruncatedPacket) when a header
    /// section runs past the buffer.
    pub fn parse(buf: &[u8]) -> crate::Result<Self> {
        let fixed = field(buf, 0, FIXED_HEADER_LEN)?;

        let version = fixed[0] >> 6;
        if version != RTP_VERSION {
            return Err(crate::RtspError::UnsupportedRtpVersion(version));
        }
        let padding = fixed[0] & 0x20 != 0;
        let has_extension = fixed[0] & 0x10 != 0;
        let csrc_count = (fixed[0] & 0x0f) as usize;

        let mut offset = FIXED_HEADER_LEN;
        let csrc = field(buf, offset, csrc_count * 4)?
            .chunks_exact(4)
            .map(be_u32)
            .collect();
        offset += csrc_count * 4;

        let extension = if has_extension {
            let header = field(buf, offset, 4)?;
            let profile = be_u16(&header[0..2]);
            let words = be_u16(&header[2..4]) as usize;
            offset += 4;
            let data = field(buf, offset, words * 4)?.to_vec();
            offset += words * 4;
            Some(RtpExtension { profile, data })
        } else {
            None
        };

        Ok(RtpPacket {
            version,
            padding,
            marker: fixed[1] & 0x80 != 0,
            payload_type: fixed[1] & 0x7f,
            sequence_number: be_u16(&fixed[2..4]),
            timestamp: be_u32(&fixed[4..8]),
            ssrc: be_u32(&fixed[8..12]),
            csrc,
            extension,
            payload: buf[offset..].to_vec(),
        })
    }

    /// Serialize the header (fixed part, CSRCs and extension).
    pub fn header_bytes(&self) -> Vec<u8> {
        let ext_len = self.extension.as_ref().map_or(0, |e| 4 + e.data.len());
        let mut out = Vec::with_capacity(FIXED_HEADER_LEN + self.csrc.len() * 4 + ext_len);

        out.push(
            (self.version << 6)
                | ((self.padding as u8) << 5)
                | ((self.extension.is_some() as u8) << 4)
                | (self.csrc.len() as u8 & 0x0f),
        );
        out.push(((self.marker as u8) << 7) | (self.payload_type & 0x7f));
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in &self.csrc {
            out.extend_from_slice(&csrc.to_be_bytes());
        }
        if let Some(ext) = &self.extension {
            out.extend_from_slice(&ext.profile.to_be_bytes());
            out.extend_from_slice(&((ext.data.len() / 4) as u16).to_be_bytes());
            out.extend_from_slice(&ext.data);
        }
        out
    }

    /// Serialize the full packet.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RtspError;

    fn minimal() -> Vec<u8> {
        vec![
            0x80, 0xE0, 0x12, 0x34, // V=2, M=1, PT=96, seq=0x1234
            0x00, 0x01, 0x5F, 0x90, // ts=90000
            0xAA, 0xBB, 0xCC, 0xDD, // ssrc
            0x65, 0x88, // payload
        ]
    }

    #[test]
    fn parses_fixed_header() {
        let p = RtpPacket::parse(&minimal()).unwrap();
        assert_eq!(p.version, 2);
        assert!(p.marker);
        assert!(!p.padding);
        assert_eq!(p.payload_type, 96);
        assert_eq!(p.sequence_number, 0x1234);
        assert_eq!(p.timestamp, 90000);
        assert_eq!(p.ssrc, 0xAABBCCDD);
        assert!(p.csrc.is_empty());
        assert!(p.extension.is_none());
        assert_eq!(p.payload, vec![0x65, 0x88]);
    }

    #[test]
    fn parses_csrcs_and_extension() {
        let mut buf = vec![0x92, 0x60, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3];
        buf.extend_from_slice(&[0, 0, 0, 10, 0, 0, 0, 11]); // 2 CSRCs
        buf.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01, 1, 2, 3, 4]); // 1-word extension
        buf.extend_from_slice(&[0xFF]);
        let p = RtpPacket::parse(&buf).unwrap();
        assert_eq!(p.csrc, vec![10, 11]);
        let ext = p.extension.as_ref().unwrap();
        assert_eq!(ext.profile, 0xBEDE);
        assert_eq!(ext.data, vec![1, 2, 3, 4]);
        assert_eq!(p.payload, vec![0xFF]);
        assert_eq!(p.to_bytes(), buf);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut buf = minimal();
        buf[0] = 0x40;
        assert!(matches!(
            RtpPacket::parse(&buf),
            Err(RtspError::UnsupportedRtpVersion(1))
        ));
    }

    #[test]
    fn short_buffer_is_truncated() {
        assert!(matches!(
            RtpPacket::parse(&minimal()[..11]),
            Err(RtspError::TruncatedPacket { needed: 12, available: 11 })
        ));
    }

    #[test]
    fn csrc_past_end_is_truncated() {
        let mut buf = minimal()[..12].to_vec();
        buf[0] = 0x83; // CC=3, but no room
        assert!(matches!(
            RtpPacket::parse(&buf),
            Err(RtspError::TruncatedPacket { .. })
        ));
    }

    #[test]
    fn extension_past_end_is_truncated() {
        let mut buf = minimal()[..12].to_vec();
        buf[0] = 0x90;
        buf.extend_from_slice(&[0x10, 0x00, 0x00, 0x04, 1, 2]);
        assert!(matches!(
            RtpPacket::parse(&buf),
            Err(RtspError::TruncatedPacket { .. })
        ));
    }

    #[test]
    fn empty_payload_is_allowed() {
        let p = RtpPacket::parse(&minimal()[..12]).unwrap();
        assert!(p.payload.is_empty());
    }

    #[test]
    fn random_headers_reserialize() {
        for _ in 0..200 {
            let csrc_count = rand::random::<u8>() % 16;
            let with_ext = rand::random::<bool>();
            let mut buf = vec![
                0x80 | (rand::random::<u8>() & 0x20) | ((with_ext as u8) << 4) | csrc_count,
                rand::random::<u8>(),
            ];
            for _ in 0..10 {
                buf.push(rand::random::<u8>());
            }
            for _ in 0..csrc_count * 4 {
                buf.push(rand::random::<u8>());
            }
            if with_ext {
                let words = rand::random::<u8>() % 4;
                buf.extend_from_slice(&[rand::random::<u8>(), rand::random::<u8>(), 0, words]);
                for _ in 0..words as usize * 4 {
                    buf.push(rand::random::<u8>());
                }
            }
            let header_len = buf.len();
            for _ in 0..rand::random::<u8>() % 32 {
                buf.push(rand::random::<u8>());
            }

            let p = RtpPacket::parse(&buf).unwrap();
            assert_eq!(p.header_bytes(), buf[..header_len], "header mismatch for {buf:02x?}");
            assert_eq!(p.to_bytes(), buf);
        }
    }
}
