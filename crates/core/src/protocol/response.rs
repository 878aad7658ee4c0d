use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::message::{Headers, Version, split_head};

/// 200 OK — success (RFC 2326 §7.1.1).
pub const STATUS_OK: u16 = 200;
/// 401 Unauthorized — a `WWW-Authenticate` challenge follows.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// An RTSP response (RFC 2326 §7).
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 2\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Responses come off the wire through [`decode`](Self::decode) (or
/// [`parse_head`](Self::parse_head) plus a separately read body when
/// streaming). The builder half (`new`/`add_header`/`with_body`/`encode`)
/// produces the same format and is what test servers use.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct RtspResponse {
    pub version: Version,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Headers,
    /// Present only when `Content-Length` was non-zero.
    pub body: Option<Vec<u8>>,
}

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        RtspResponse {
            version: Version::RTSP_1_0,
            status_code,
            status_text: status_text.to_string(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(STATUS_OK, "OK")
    }

    pub fn unauthorized() -> Self {
        Self::new(STATUS_UNAUTHORIZED, "Unauthorized")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Attach a body; `Content-Length` is set to match (RFC 2326 §12.14).
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.headers.set("Content-Length", &body.len().to_string());
        self.body = Some(body);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// CSeq echoed from the request this response answers.
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.trim().parse().ok())
    }

    /// Serialize to the RTSP wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!(
            "{} {} {}\r\n",
            self.version, self.status_code, self.status_text
        )
        .into_bytes();
        self.headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }

    /// Parse the status line and header block only.
    ///
    /// The body, if `Content-Length` announces one, is left to the caller;
    /// the returned response has `body: None`.
    pub fn parse_head(raw: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(raw);
        let mut lines = text.lines();

        let status_line = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or(RtspError::MalformedMessage(ParseErrorKind::EmptyMessage))?;

        let mut parts = status_line.trim().splitn(3, char::is_whitespace);
        let (Some(version), Some(code), Some(reason)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseErrorKind::InvalidStatusLine.into());
        };

        let version = Version::parse(version)?;
        let status_code = match code.parse::<u16>() {
            Ok(code) if code.to_string().len() == 3 => code,
            _ => return Err(ParseErrorKind::InvalidStatusCode.into()),
        };
        let headers = Headers::parse_lines(lines)?;

        Ok(RtspResponse {
            version,
            status_code,
            status_text: reason.trim().to_string(),
            headers,
            body: None,
        })
    }

    /// Parse one complete response: status line, headers, blank line, and
    /// exactly `Content-Length` body bytes. Bytes beyond the body are ignored.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let (head, rest) = split_head(raw);
        let mut response = Self::parse_head(head)?;
        let length = response.headers.content_length()?;
        if length > 0 {
            let body = rest
                .get(..length)
                .ok_or(RtspError::MalformedMessage(ParseErrorKind::TruncatedBody))?;
            response.body = Some(body.to_vec());
        }
        Ok(response)
    }
}
