use std::fmt;

use crate::error::{Result, RtspError};

/// Transport specification exchanged during SETUP (RFC 2326 §12.39).
///
/// The client always asks for RTP interleaved on the control connection,
/// with track `i` on channels `2i` (RTP) and `2i+1` (RTCP).
///
/// ## Wire format example
///
/// ```text
/// Client → Server:
///   Transport: RTP/AVP/TCP;unicast;interleaved=0-1
///
/// Server → Client:
///   Transport: RTP/AVP/TCP;unicast;interleaved=0-1;ssrc=1A2B3C4D
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHeader {
    /// e.g. `RTP/AVP/TCP`.
    pub protocol: String,
    pub unicast: bool,
    /// `(rtp_channel, rtcp_channel)`.
    pub interleaved: Option<(u8, u8)>,
    pub ssrc: Option<u32>,
}

impl TransportHeader {
    /// The interleaved transport requested for `track`.
    pub fn for_track(track: usize) -> Result<Self> {
        let rtp = u8::try_from(track * 2)
            .ok()
            .filter(|channel| *channel < u8::MAX)
            .ok_or_else(|| {
                RtspError::InvalidDescriptor(format!("track {track} has no interleaved channel"))
            })?;
        Ok(Self {
            protocol: "RTP/AVP/TCP".to_string(),
            unicast: true,
            interleaved: Some((rtp, rtp + 1)),
            ssrc: None,
        })
    }

    /// Parse the `Transport` header value (RFC 2326 §12.39).
    ///
    /// Only the first transport spec of a comma-separated list is read.
    /// Unknown parameters are skipped.
    ///
    /// ## Examples
    ///
    /// ```
    /// use rtsp::session::transport::TransportHeader;
    ///
    /// let th = TransportHeader::parse("RTP/AVP/TCP;unicast;interleaved=2-3").unwrap();
    /// assert_eq!(th.interleaved, Some((2, 3)));
    ///
    /// assert!(TransportHeader::parse("").is_none());
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.split(',').next()?.trim();
        let mut parts = spec.split(';').map(str::trim);
        let protocol = parts.next().filter(|p| !p.is_empty())?.to_string();

        let mut transport = TransportHeader {
            protocol,
            unicast: false,
            interleaved: None,
            ssrc: None,
        };
        for part in parts {
            if part.eq_ignore_ascii_case("unicast") {
                transport.unicast = true;
            } else if let Some(channels) = part.strip_prefix("interleaved=") {
                let (rtp, rtcp) = match channels.split_once('-') {
                    Some((rtp, rtcp)) => (rtp.parse().ok()?, rtcp.parse().ok()?),
                    None => {
                        let rtp: u8 = channels.parse().ok()?;
                        (rtp, rtp.checked_add(1)?)
                    }
                };
                transport.interleaved = Some((rtp, rtcp));
            } else if let Some(ssrc) = part.strip_prefix("ssrc=") {
                transport.ssrc = u32::from_str_radix(ssrc, 16).ok();
            }
        }
        Some(transport)
    }
}

impl fmt::Display for TransportHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.protocol)?;
        if self.unicast {
            write!(f, ";unicast")?;
        }
        if let Some((rtp, rtcp)) = self.interleaved {
            write!(f, ";interleaved={rtp}-{rtcp}")?;
        }
        if let Some(ssrc) = self.ssrc {
            write!(f, ";ssrc={ssrc:08X}")?;
        }
        Ok(())
    }
}
