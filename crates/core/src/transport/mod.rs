//! Network transport for the RTSP client.
//!
//! Everything travels over one TCP connection (RFC 2326 §10.12):
//!
//! - **TCP** ([`tcp`]): opens the control connection and splits it into a
//!   read half and a write half.
//!
//! - **Interleaved demultiplexing** ([`interleaved`]): a task owns the
//!   read half and separates RTSP responses from `$`-framed RTP and RTCP,
//!   feeding each into its own bounded queue.
//!
//! Requests are written directly on the write half by the session.

pub mod interleaved;
pub mod tcp;

pub use interleaved::{DemuxQueues, QueueCapacity, RtcpPacket};
