use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::{ParseErrorKind, Result, RtspError, is_closed};
use crate::media::RtpPacket;
use crate::protocol::RtspResponse;

/// Upper bound on a response head (status line + headers).
const MAX_HEAD_LEN: usize = 64 * 1024;

/// Upper bound on a response body. Descriptions are a few KiB at most.
const MAX_BODY_LEN: usize = 1024 * 1024;

/// Capacities of the queues the demultiplexer feeds.
#[derive(Debug, Clone, Copy)]
pub struct QueueCapacity {
    /// Responses, RTP and RTCP.
    pub messages: usize,
    pub errors: usize,
}

impl Default for QueueCapacity {
    fn default() -> Self {
        Self {
            messages: 10,
            errors: 100,
        }
    }
}

/// An RTCP packet as received, tagged with its track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpPacket {
    pub track: usize,
    pub data: Vec<u8>,
}

/// Receiving ends of the demultiplexer's queues.
///
/// Every queue closes once the reader task exits. The error queue carries
/// the reason (normally [`RtspError::ConnectionClosed`]).
#[derive(Debug)]
pub struct DemuxQueues {
    pub responses: mpsc::Receiver<RtspResponse>,
    /// RTP packets paired with their track index (`channel / 2`).
    pub rtp: mpsc::Receiver<(usize, RtpPacket)>,
    pub rtcp: mpsc::Receiver<RtcpPacket>,
    pub errors: mpsc::Receiver<RtspError>,
}

/// Splits the shared RTSP connection into responses and media.
///
/// On an interleaved connection (RFC 2326 §10.12) the server mixes RTSP
/// responses and `$`-framed binary data on the same byte stream:
///
/// ```text
/// RTSP/1.0 200 OK\r\n...\r\n\r\n[body]     ← response, recognised by 'R'
/// $ <channel:u8> <length:u16be> <data>     ← RTP (even) / RTCP (odd) channel
/// ```
///
/// The first byte of every frame selects the parser. Bytes that start
/// neither form are logged and skipped.
pub struct Demuxer<R> {
    reader: BufReader<R>,
    responses: mpsc::Sender<RtspResponse>,
    rtp: mpsc::Sender<(usize, RtpPacket)>,
    rtcp: mpsc::Sender<RtcpPacket>,
    errors: mpsc::Sender<RtspError>,
}

/// Start a demultiplexer task over the read half of the connection.
pub fn spawn<R>(reader: R, capacity: QueueCapacity) -> (JoinHandle<()>, DemuxQueues)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (demuxer, queues) = Demuxer::new(reader, capacity);
    (tokio::spawn(demuxer.run()), queues)
}

/// Whether the caller should keep reading after handling a frame.
enum Flow {
    Continue,
    Stop,
}

impl<R: AsyncRead + Unpin> Demuxer<R> {
    pub fn new(reader: R, capacity: QueueCapacity) -> (Self, DemuxQueues) {
        let messages = capacity.messages.max(1);
        let (responses_tx, responses) = mpsc::channel(messages);
        let (rtp_tx, rtp) = mpsc::channel(messages);
        let (rtcp_tx, rtcp) = mpsc::channel(messages);
        let (errors_tx, errors) = mpsc::channel(capacity.errors.max(1));
        (
            Self {
                reader: BufReader::new(reader),
                responses: responses_tx,
                rtp: rtp_tx,
                rtcp: rtcp_tx,
                errors: errors_tx,
            },
            DemuxQueues {
                responses,
                rtp,
                rtcp,
                errors,
            },
        )
    }

    /// Read frames until the connection closes or every consumer is gone.
    ///
    /// Other read and parse failures are reported on the error queue and
    /// reading resumes with the next byte.
    pub async fn run(mut self) {
        loop {
            match self.next_frame().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    tracing::debug!("demuxer consumers dropped");
                    break;
                }
                Err(e) => {
                    let stop = e.is_fatal();
                    if stop {
                        tracing::debug!(error = %e, "demuxer stopping");
                    } else {
                        tracing::warn!(error = %e, "read failed, resuming at next frame");
                    }
                    if self.errors.send(e).await.is_err() || stop {
                        break;
                    }
                }
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Flow> {
        match self.read_u8().await? {
            b'$' => {
                let channel = self.read_u8().await?;
                let length = self.reader.read_u16().await.map_err(read_error)? as usize;
                let mut data = vec![0u8; length];
                self.reader.read_exact(&mut data).await.map_err(read_error)?;
                self.dispatch_interleaved(channel, data).await
            }
            b'R' => {
                let response = self.read_response().await?;
                tracing::trace!(
                    status = response.status_code,
                    cseq = ?response.cseq(),
                    "response received"
                );
                Ok(match self.responses.send(response).await {
                    Ok(()) => Flow::Continue,
                    Err(_) => Flow::Stop,
                })
            }
            other => {
                tracing::warn!(byte = other, "unexpected frame start byte");
                Ok(Flow::Continue)
            }
        }
    }

    async fn read_u8(&mut self) -> Result<u8> {
        self.reader.read_u8().await.map_err(read_error)
    }

    /// Read the rest of a response whose leading `R` was already consumed.
    async fn read_response(&mut self) -> Result<RtspResponse> {
        let mut prefix = [0u8; 3];
        self.reader.read_exact(&mut prefix).await.map_err(read_error)?;
        if &prefix != b"TSP" {
            return Err(ParseErrorKind::InvalidStatusLine.into());
        }

        let mut head = b"RTSP".to_vec();
        loop {
            // A single line may not grow the head past the limit either.
            let budget = (MAX_HEAD_LEN + 1).saturating_sub(head.len()) as u64;
            let n = (&mut self.reader)
                .take(budget)
                .read_until(b'\n', &mut head)
                .await
                .map_err(read_error)?;
            if head.len() > MAX_HEAD_LEN {
                return Err(ParseErrorKind::InvalidHeader.into());
            }
            if n == 0 {
                return Err(RtspError::ConnectionClosed);
            }
            if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
                break;
            }
        }

        let mut response = RtspResponse::parse_head(&head)?;
        let length = response.headers.content_length()?;
        if length > MAX_BODY_LEN {
            return Err(ParseErrorKind::InvalidContentLength.into());
        }
        if length > 0 {
            let mut body = vec![0u8; length];
            self.reader.read_exact(&mut body).await.map_err(read_error)?;
            response.body = Some(body);
        }
        Ok(response)
    }

    async fn dispatch_interleaved(&mut self, channel: u8, data: Vec<u8>) -> Result<Flow> {
        let track = (channel / 2) as usize;
        if channel % 2 == 1 {
            match self.rtcp.try_send(RtcpPacket { track, data }) {
                Err(TrySendError::Full(_)) => tracing::trace!(track, "RTCP queue full, dropping"),
                Ok(()) | Err(TrySendError::Closed(_)) => {}
            }
            return Ok(Flow::Continue);
        }

        let packet = match RtpPacket::parse(&data) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(channel, error = %e, "dropping unparseable RTP packet");
                return Ok(Flow::Continue);
            }
        };
        Ok(match self.rtp.send((track, packet)).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        })
    }
}

fn read_error(e: std::io::Error) -> RtspError {
    if is_closed(e.kind()) {
        RtspError::ConnectionClosed
    } else {
        RtspError::Transport(e)
    }
}
