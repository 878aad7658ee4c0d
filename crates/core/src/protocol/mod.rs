//! RTSP protocol implementation, client side (RFC 2326).
//!
//! This module handles the text-based RTSP signaling protocol: encoding
//! requests, decoding responses, digest authentication, and extracting
//! track descriptions from DESCRIBE bodies.
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! DESCRIBE rtsp://server/stream RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! Key differences from HTTP:
//! - Stateful: sessions persist across requests (RFC 2326 §3).
//! - Different methods: OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN.
//! - Session header carries a server-assigned ID (RFC 2326 §12.37).
//!
//! ## Methods issued by the client
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | OPTIONS | §10.1 | Capability probe |
//! | DESCRIBE | §10.2 | Retrieve SDP session description |
//! | SETUP | §10.4 | Negotiate interleaved transport |
//! | PLAY | §10.5 | Start media delivery |
//! | TEARDOWN | §10.7 | Destroy session |
//! | GET_PARAMETER | §10.8 | Keepalive |

pub mod auth;
pub mod message;
pub mod request;
pub mod response;
pub mod sdp;

pub use auth::{Credentials, DigestAuth, challenge_response};
pub use message::{Headers, Method, Version};
pub use request::RtspRequest;
pub use response::{RtspResponse, STATUS_OK, STATUS_UNAUTHORIZED};
pub use sdp::MediaDescriptor;
