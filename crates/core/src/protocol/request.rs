use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::message::{Headers, Method, Version, split_head};

/// An RTSP request (RFC 2326 §6).
///
/// RTSP requests follow HTTP/1.1 syntax:
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Built with [`new`](Self::new) and the `add_header`/`with_body`
/// builders, then written to the wire with [`encode`](Self::encode).
/// Once encoded and sent, a request is never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct RtspRequest {
    /// RTSP method (OPTIONS, DESCRIBE, SETUP, PLAY, etc.).
    pub method: Method,
    /// Request-URI (e.g. `rtsp://host:port/stream/track1`).
    pub uri: String,
    /// Protocol version (normally `RTSP/1.0`).
    pub version: Version,
    /// Headers in insertion order. Repeated names are written repeatedly.
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl RtspRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        RtspRequest {
            method,
            uri: uri.to_string(),
            version: Version::RTSP_1_0,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Attach a body and set `Content-Length` to its size (RFC 2326 §12.14).
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.headers.set("Content-Length", &body.len().to_string());
        self.body = Some(body);
        self
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns the CSeq header value, which numbers and orders RTSP
    /// request/response pairs (RFC 2326 §12.17).
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// Serialize to the RTSP wire format. The body, if any, is appended
    /// verbatim after the blank line.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, self.version).into_bytes();
        self.headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }

    /// Parse an RTSP request from its wire representation.
    ///
    /// Expects the request line, headers, the trailing blank line and
    /// exactly `Content-Length` body bytes.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, rest) = split_head(raw);
        let head = String::from_utf8_lossy(head);
        let mut lines = head.lines();

        let request_line = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or(RtspError::MalformedMessage(ParseErrorKind::EmptyMessage))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseErrorKind::InvalidRequestLine.into());
        }

        let method: Method = parts[0].parse()?;
        let uri = parts[1].to_string();
        let version = Version::parse(parts[2])?;
        let headers = Headers::parse_lines(lines)?;

        let length = headers.content_length()?;
        let body = if length > 0 {
            let body = rest
                .get(..length)
                .ok_or(RtspError::MalformedMessage(ParseErrorKind::TruncatedBody))?;
            Some(body.to_vec())
        } else {
            None
        };

        Ok(RtspRequest {
            method,
            uri,
            version,
            headers,
            body,
        })
    }
}
