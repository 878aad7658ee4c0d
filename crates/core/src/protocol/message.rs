use std::fmt;
use std::str::FromStr;

use crate::error::{ParseErrorKind, Result, RtspError};

/// RTSP request methods (RFC 2326 §10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Describe,
    Announce,
    Setup,
    Play,
    Pause,
    Record,
    Redirect,
    Teardown,
    GetParameter,
    SetParameter,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Describe => "DESCRIBE",
            Self::Announce => "ANNOUNCE",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Record => "RECORD",
            Self::Redirect => "REDIRECT",
            Self::Teardown => "TEARDOWN",
            Self::GetParameter => "GET_PARAMETER",
            Self::SetParameter => "SET_PARAMETER",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RtspError;

    fn from_str(s: &str) -> Result<Self> {
        let method = match s {
            "OPTIONS" => Self::Options,
            "DESCRIBE" => Self::Describe,
            "ANNOUNCE" => Self::Announce,
            "SETUP" => Self::Setup,
            "PLAY" => Self::Play,
            "PAUSE" => Self::Pause,
            "RECORD" => Self::Record,
            "REDIRECT" => Self::Redirect,
            "TEARDOWN" => Self::Teardown,
            "GET_PARAMETER" => Self::GetParameter,
            "SET_PARAMETER" => Self::SetParameter,
            other => return Err(ParseErrorKind::UnknownMethod(other.to_string()).into()),
        };
        Ok(method)
    }
}

/// Protocol version token, e.g. `RTSP/1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const RTSP_1_0: Version = Version { major: 1, minor: 0 };

    /// Parse `RTSP/<major>.<minor>`.
    ///
    /// Anything other than the `RTSP` protocol name or non-decimal
    /// major/minor fields fails with [`RtspError::UnsupportedVersion`].
    pub fn parse(token: &str) -> Result<Self> {
        let unsupported = || RtspError::UnsupportedVersion(token.to_string());

        let (proto, numbers) = token.split_once('/').ok_or_else(unsupported)?;
        if proto != "RTSP" {
            return Err(unsupported());
        }
        let (major, minor) = numbers.split_once('.').ok_or_else(unsupported)?;
        let decimal = |s: &str| -> Result<u32> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(unsupported());
            }
            s.parse().map_err(|_| unsupported())
        };

        Ok(Version {
            major: decimal(major)?,
            minor: decimal(minor)?,
        })
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::RTSP_1_0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RTSP/{}.{}", self.major, self.minor)
    }
}

/// Ordered header block.
///
/// Repeated names are kept as separate entries in arrival order, never
/// merged. Lookups are case-insensitive per RFC 2326 §4.2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any existing values for the same name.
    pub fn add(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Replace every value for `name` with a single one.
    pub fn set(&mut self, name: &str, value: &str) {
        self.remove(name);
        self.add(name, value);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every value for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Content-Length` as a byte count; absent means zero.
    pub fn content_length(&self) -> Result<usize> {
        match self.get("Content-Length") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ParseErrorKind::InvalidContentLength.into()),
            None => Ok(0),
        }
    }

    /// Parse `Name: Value` lines up to (and excluding) the first blank line.
    pub(crate) fn parse_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Self> {
        let mut headers = Headers::new();
        for line in lines {
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or(RtspError::MalformedMessage(
                ParseErrorKind::InvalidHeader,
            ))?;
            headers.add(name.trim(), value.trim());
        }
        Ok(headers)
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
}

/// Split a raw message into its head (start line + headers, as text) and
/// whatever follows the blank line.
pub(crate) fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\n' {
            let rest = &raw[i + 1..];
            if rest.starts_with(b"\r\n") {
                return (&raw[..i + 1], &rest[2..]);
            }
            if rest.starts_with(b"\n") {
                return (&raw[..i + 1], &rest[1..]);
            }
        }
        i += 1;
    }
    (raw, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version() {
        assert_eq!(Version::parse("RTSP/1.0").unwrap(), Version::RTSP_1_0);
        assert_eq!(
            Version::parse("RTSP/2.1").unwrap(),
            Version { major: 2, minor: 1 }
        );
    }

    #[test]
    fn reject_non_decimal_version() {
        assert!(matches!(
            Version::parse("RTSP/1.x"),
            Err(RtspError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            Version::parse("RTSP/+1.0"),
            Err(RtspError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            Version::parse("HTTP/1.1"),
            Err(RtspError::UnsupportedVersion(_))
        ));
        assert!(Version::parse("RTSP").is_err());
    }

    #[test]
    fn repeated_headers_keep_order() {
        let mut h = Headers::new();
        h.add("Public", "OPTIONS");
        h.add("CSeq", "1");
        h.add("public", "DESCRIBE");
        let all: Vec<_> = h.get_all("PUBLIC").collect();
        assert_eq!(all, vec!["OPTIONS", "DESCRIBE"]);
        assert_eq!(h.get("cseq"), Some("1"));
    }

    #[test]
    fn get_returns_first_value_and_outlives_name() {
        let mut h = Headers::new();
        h.add("WWW-Authenticate", "Basic realm=\"x\"");
        h.add("www-authenticate", "Digest realm=\"x\"");
        let value = {
            let name = String::from("Www-Authenticate");
            h.get(&name)
        };
        assert_eq!(value, Some("Basic realm=\"x\""));
        assert_eq!(h.get("Missing"), None);
    }

    #[test]
    fn set_replaces_all_values() {
        let mut h = Headers::new();
        h.add("Session", "a");
        h.add("session", "b");
        h.set("Session", "c");
        assert_eq!(h.get_all("Session").collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn header_without_colon_is_malformed() {
        let err = Headers::parse_lines(["CSeq 1"].into_iter()).unwrap_err();
        assert!(matches!(
            err,
            RtspError::MalformedMessage(ParseErrorKind::InvalidHeader)
        ));
    }

    #[test]
    fn split_head_handles_crlf_and_lf() {
        let (head, rest) = split_head(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\nbody");
        assert_eq!(head, b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n");
        assert_eq!(rest, b"body");

        let (head, rest) = split_head(b"RTSP/1.0 200 OK\nCSeq: 1\n\nxy");
        assert_eq!(head, b"RTSP/1.0 200 OK\nCSeq: 1\n");
        assert_eq!(rest, b"xy");
    }

    #[test]
    fn method_round_trips_through_text() {
        for m in [Method::Options, Method::GetParameter, Method::Teardown] {
            assert_eq!(m.as_str().parse::<Method>().unwrap(), m);
        }
        assert!("FETCH".parse::<Method>().is_err());
    }
}
