//! SDP (Session Description Protocol) parsing (RFC 4566 / RFC 8866).
//!
//! Only the parts a DESCRIBE consumer needs are extracted, one
//! [`MediaDescriptor`] per `m=` section:
//!
//! ```text
//! m=video 0 RTP/AVP 96                      ← media type, port, protocol, payload type
//! a=control:trackID=0                       ← per-track SETUP target
//! a=rtpmap:96 H264/90000                    ← codec name / clock rate
//! a=fmtp:96 packetization-mode=1;profile-level-id=64002A;sprop-parameter-sets=Z2QAKq...,aO48sAA=
//! ```
//!
//! Everything else (`o=`, `c=`, `t=`, bandwidth, unknown attributes) is
//! skipped.

use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::error::{Result, RtspError};

/// What a session needs to know about one advertised track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaDescriptor {
    /// `video`, `audio`, ...
    pub media_type: String,
    pub port: u16,
    /// Transport protocol token, e.g. `RTP/AVP`.
    pub protocol: String,
    pub payload_type: u8,
    /// `a=control:` value; relative to the content base unless absolute.
    pub control: String,
    /// Encoding name from `a=rtpmap` (e.g. `H264`, `MPEG4-GENERIC`).
    pub codec_name: String,
    /// Clock rate from `a=rtpmap`, when given.
    pub clock_rate: Option<u32>,
    pub channels: Option<u16>,
    /// `config=` from `a=fmtp`, hex-decoded (AAC AudioSpecificConfig, or an
    /// Annex B parameter-set blob from some H.264 servers).
    pub config: Vec<u8>,
    /// `sprop-parameter-sets=` from `a=fmtp`, base64-decoded.
    pub sprop_parameter_sets: Vec<Vec<u8>>,
    pub profile_level_id: Option<String>,
    pub size_length: Option<u32>,
    pub index_length: Option<u32>,
    pub framerate: Option<f64>,
}

/// Parse an SDP body into per-track descriptors, in `m=` order.
pub fn parse(body: &[u8]) -> Result<Vec<MediaDescriptor>> {
    let text = String::from_utf8_lossy(body);
    let mut medias: Vec<MediaDescriptor> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        let Some((kind, value)) = line.split_once('=') else {
            continue;
        };
        if kind.len() != 1 {
            return Err(RtspError::InvalidDescriptor(format!(
                "SDP type must be one character: {line:?}"
            )));
        }

        match (kind, medias.last_mut()) {
            ("m", _) => medias.push(parse_media_line(value)?),
            ("a", Some(media)) => parse_media_attribute(media, value),
            _ => {}
        }
    }

    tracing::debug!(tracks = medias.len(), "SDP parsed");
    Ok(medias)
}

/// `m=<media> <port>[/<count>] <proto> <fmt> ...`
fn parse_media_line(value: &str) -> Result<MediaDescriptor> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(RtspError::InvalidDescriptor(format!(
            "media line needs 4 fields: {value:?}"
        )));
    }

    let port = fields[1]
        .split('/')
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| RtspError::InvalidDescriptor(format!("bad media port: {}", fields[1])))?;
    let payload_type = fields[3]
        .parse::<u8>()
        .ok()
        .filter(|pt| *pt < 128)
        .ok_or_else(|| {
            RtspError::InvalidDescriptor(format!("bad payload type: {}", fields[3]))
        })?;

    Ok(MediaDescriptor {
        media_type: fields[0].to_string(),
        port,
        protocol: fields[2].to_string(),
        payload_type,
        ..MediaDescriptor::default()
    })
}

fn parse_media_attribute(media: &mut MediaDescriptor, value: &str) {
    let Some((name, rest)) = value.split_once(':') else {
        return;
    };

    match name {
        "control" => media.control = rest.trim().to_string(),
        "framerate" => media.framerate = rest.trim().parse().ok(),
        "rtpmap" => parse_rtpmap(media, rest),
        "fmtp" => parse_fmtp(media, rest),
        _ => {}
    }
}

/// `a=rtpmap:<pt> <name>/<clock>[/<channels>]`
fn parse_rtpmap(media: &mut MediaDescriptor, rest: &str) {
    let Some((pt, encoding)) = rest.trim().split_once(' ') else {
        return;
    };
    if pt.parse::<u8>().ok() != Some(media.payload_type) {
        return;
    }
    let mut parts = encoding.trim().split('/');
    if let Some(name) = parts.next() {
        media.codec_name = name.to_string();
    }
    media.clock_rate = parts.next().and_then(|c| c.parse().ok());
    media.channels = parts.next().and_then(|c| c.parse().ok());
}

/// `a=fmtp:<pt> key=value;key=value`
fn parse_fmtp(media: &mut MediaDescriptor, rest: &str) {
    let Some((pt, params)) = rest.trim().split_once(' ') else {
        return;
    };
    if pt.parse::<u8>().ok() != Some(media.payload_type) {
        return;
    }

    for param in params.split(';') {
        let Some((key, value)) = param.trim().split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "config" => match hex::decode(value) {
                Ok(config) => media.config = config,
                Err(e) => tracing::warn!(error = %e, value, "fmtp config is not hex"),
            },
            "sprop-parameter-sets" => {
                media.sprop_parameter_sets = value
                    .split(',')
                    .filter(|set| !set.is_empty())
                    .filter_map(|set| match BASE64_STANDARD.decode(set) {
                        Ok(nal) => Some(nal),
                        Err(e) => {
                            tracing::warn!(error = %e, set, "sprop-parameter-sets entry is not base64");
                            None
                        }
                    })
                    .collect();
            }
            "profile-level-id" => media.profile_level_id = Some(value.to_string()),
            "sizelength" => media.size_length = value.parse().ok(),
            "indexlength" => media.index_length = value.parse().ok(),
            _ => {}
        }
    }
}
