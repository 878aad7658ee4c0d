//! RTSP client session engine (RFC 2326 §A.1, client side).
//!
//! A [`Session`] owns everything one pull needs: the write half of the
//! connection, the demultiplexer task reading the other half, the digest
//! cache, the CSeq counter and one [`Stream`] per advertised track.
//!
//! ## Session lifecycle
//!
//! ```text
//! connect           -> Initial
//! DESCRIBE          -> Described          (one Stream per m= section)
//! SETUP (all)       -> SetUp
//! PLAY              -> AwaitingCodecData  (or ReadyForMedia when every
//!                                          track already has codec params)
//! read_access_unit  -> ReadyForMedia      (once every track has them)
//! TEARDOWN          -> Initial
//! ```
//!
//! States only move forward, except TEARDOWN which starts over.
//!
//! ## Keep-alive
//!
//! While media flows, a `GET_PARAMETER` is sent without waiting for its
//! reply whenever the keep-alive interval has passed. The interval is the
//! configured one, shortened to half the `timeout` the server advertised
//! in its `Session` header.

pub mod transport;

use std::fmt;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Result, RtspError};
use crate::media::{AccessUnit, CodecParams, Stream};
use crate::protocol::{Credentials, DigestAuth, Method, RtspRequest, RtspResponse, sdp};
use crate::protocol::STATUS_UNAUTHORIZED;
use crate::transport::{DemuxQueues, interleaved, tcp};
pub use transport::TransportHeader;

/// Port used when the URL names none (RFC 2326 §3.2).
pub const DEFAULT_RTSP_PORT: u16 = 554;

/// Client session state. Ordered: later states compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// Connected, nothing negotiated.
    Initial,
    /// Tracks known from DESCRIBE.
    Described,
    /// Every track has a transport.
    SetUp,
    /// Playing, but some track still lacks codec parameters.
    AwaitingCodecData,
    /// Playing with codec parameters for every track.
    ReadyForMedia,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// One RTSP client session over an interleaved TCP connection.
///
/// Dropping the session stops its demultiplexer task and closes the
/// connection.
pub struct Session {
    config: ClientConfig,
    /// Request target, credentials stripped.
    url: Url,
    /// Base for relative track controls, from `Content-Base`.
    content_base: Option<Url>,
    writer: Writer,
    demux: JoinHandle<()>,
    queues: DemuxQueues,
    auth: DigestAuth,
    cseq: u32,
    session_id: Option<String>,
    server_timeout: Option<Duration>,
    state: SessionState,
    streams: Vec<Stream>,
    set_up: Vec<bool>,
    last_keepalive: Instant,
}

impl Session {
    /// Connect to `rtsp://[user[:pass]@]host[:port]/path`.
    ///
    /// Credentials in the URL seed the digest cache and never appear in a
    /// request target.
    pub async fn connect(url: &str, config: ClientConfig) -> Result<Self> {
        let (url, credentials) = parse_url(url)?;
        let host = url
            .host_str()
            .ok_or_else(|| RtspError::InvalidUrl(format!("{url}: missing host")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port().unwrap_or(DEFAULT_RTSP_PORT);

        let stream = tcp::connect(&host, port).await?;
        let (reader, writer) = tcp::split(stream);
        Ok(Self::with_parts(reader, Box::new(writer), url, credentials, config))
    }

    /// Run a session over an already established byte stream.
    ///
    /// Must be called from within a tokio runtime: the demultiplexer task
    /// is spawned immediately.
    pub fn from_stream<S>(stream: S, url: &str, config: ClientConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (url, credentials) = parse_url(url)?;
        let (reader, writer) = tokio::io::split(stream);
        Ok(Self::with_parts(reader, Box::new(writer), url, credentials, config))
    }

    fn with_parts<R>(
        reader: R,
        writer: Writer,
        url: Url,
        credentials: Option<Credentials>,
        config: ClientConfig,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (demux, queues) = interleaved::spawn(reader, config.queues());
        Self {
            config,
            url,
            content_base: None,
            writer,
            demux,
            queues,
            auth: DigestAuth::new(credentials),
            cseq: 0,
            session_id: None,
            server_timeout: None,
            state: SessionState::Initial,
            streams: Vec::new(),
            set_up: Vec::new(),
            last_keepalive: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn content_base(&self) -> Option<&Url> {
        self.content_base.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Timeout the server advertised in its `Session` header.
    pub fn server_timeout(&self) -> Option<Duration> {
        self.server_timeout
    }

    pub fn auth(&self) -> &DigestAuth {
        &self.auth
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Tracks in `m=` order; the index is the track number.
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream(&self, track: usize) -> Option<&Stream> {
        self.streams.get(track)
    }

    /// Effective keep-alive period.
    pub fn keepalive_interval(&self) -> Duration {
        self.config.keepalive_for(self.server_timeout)
    }

    /// OPTIONS: announce the client. Any status is accepted.
    pub async fn options(&mut self) -> Result<RtspResponse> {
        let request = RtspRequest::new(Method::Options, self.url.as_str());
        self.exchange(request).await
    }

    /// DESCRIBE: fetch the session description and create one [`Stream`]
    /// per track, deriving codec parameters where the description allows.
    pub async fn describe(&mut self) -> Result<&[Stream]> {
        self.expect_state("DESCRIBE", &[SessionState::Initial, SessionState::Described])?;

        let request = RtspRequest::new(Method::Describe, self.url.as_str())
            .add_header("Accept", "application/sdp");
        let response = self.exchange(request).await?;
        let response = check_success(Method::Describe, response)?;

        self.content_base = response
            .get_header("Content-Base")
            .or_else(|| response.get_header("Content-Location"))
            .and_then(|base| match parse_url(base.trim()) {
                Ok((base, _)) => Some(base),
                Err(e) => {
                    warn!(error = %e, "ignoring unusable content base");
                    None
                }
            });

        let body = response.body.as_deref().unwrap_or_default();
        let medias = sdp::parse(body)?;
        if medias.is_empty() {
            return Err(RtspError::InvalidDescriptor(
                "description has no media sections".into(),
            ));
        }

        self.streams = medias
            .into_iter()
            .enumerate()
            .map(|(track, media)| {
                Stream::new(track, media)
                    .with_limits(self.config.default_clock_rate, self.config.max_timestamp_jump)
            })
            .collect();
        for stream in &mut self.streams {
            if let Err(e) = stream.derive_codec_params() {
                info!(
                    track = stream.track(),
                    error = %e,
                    "codec parameters not in description, waiting for in-band"
                );
            }
        }
        self.set_up = vec![false; self.streams.len()];
        self.transition(SessionState::Described);
        Ok(&self.streams)
    }

    /// SETUP one track with the given transport.
    ///
    /// Returns the transport the server answered with, if it sent one.
    pub async fn setup_track(
        &mut self,
        track: usize,
        transport: &TransportHeader,
    ) -> Result<Option<TransportHeader>> {
        self.expect_state("SETUP", &[SessionState::Described])?;
        let control = match self.streams.get(track) {
            Some(stream) => stream.media().control.clone(),
            None => {
                return Err(RtspError::InvalidDescriptor(format!(
                    "no track {track} in description of {} tracks",
                    self.streams.len()
                )));
            }
        };

        let uri = self.track_uri(&control);
        let request =
            RtspRequest::new(Method::Setup, &uri).add_header("Transport", &transport.to_string());
        let response = check_success(Method::Setup, self.exchange(request).await?)?;

        let reply = response.get_header("Transport").and_then(TransportHeader::parse);
        match &reply {
            Some(reply) if reply.interleaved != transport.interleaved => warn!(
                track,
                requested = ?transport.interleaved,
                granted = ?reply.interleaved,
                "server changed interleaved channels"
            ),
            Some(_) => {}
            None => debug!(track, "SETUP reply has no usable Transport header"),
        }

        self.set_up[track] = true;
        if self.set_up.iter().all(|done| *done) {
            self.transition(SessionState::SetUp);
        }
        Ok(reply)
    }

    /// SETUP every track not set up yet, track `i` on channels `2i`/`2i+1`.
    pub async fn setup(&mut self) -> Result<()> {
        self.expect_state("SETUP", &[SessionState::Described])?;
        for track in 0..self.streams.len() {
            if !self.set_up[track] {
                let transport = TransportHeader::for_track(track)?;
                self.setup_track(track, &transport).await?;
            }
        }
        Ok(())
    }

    /// PLAY: start media delivery and arm the keep-alive.
    pub async fn play(&mut self) -> Result<()> {
        self.expect_state("PLAY", &[SessionState::SetUp])?;
        let request = RtspRequest::new(Method::Play, &self.aggregate_uri())
            .add_header("Range", "npt=0.000-");
        let response = check_success(Method::Play, self.exchange(request).await?)?;
        if let Some(range) = response.get_header("Range") {
            debug!(range, "playing");
        }

        self.last_keepalive = Instant::now();
        if self.streams.iter().all(Stream::is_codec_ready) {
            self.transition(SessionState::ReadyForMedia);
        } else {
            self.transition(SessionState::AwaitingCodecData);
        }
        Ok(())
    }

    /// Next complete access unit from any track.
    ///
    /// Until every track has codec parameters, completed units are
    /// discarded and depacketization errors only logged. After that,
    /// errors are returned; [`CodecParametersChanged`](RtspError::CodecParametersChanged)
    /// calls for [`rederive_codec_params`](Self::rederive_codec_params),
    /// after which the held unit is returned by the next call.
    pub async fn read_access_unit(&mut self) -> Result<AccessUnit> {
        self.expect_state(
            "read_access_unit",
            &[SessionState::AwaitingCodecData, SessionState::ReadyForMedia],
        )?;

        if self.state == SessionState::ReadyForMedia {
            for stream in &mut self.streams {
                if let Some(unit) = stream.take_pending()? {
                    return Ok(unit);
                }
            }
        }

        loop {
            self.keepalive_if_due().await;
            let (track, packet) = self.next_rtp().await?;
            let Some(stream) = self.streams.get_mut(track) else {
                debug!(track, "RTP for unknown track");
                continue;
            };
            let result = stream.handle_rtp(&packet);

            if self.state == SessionState::ReadyForMedia {
                if let Some(unit) = result? {
                    return Ok(unit);
                }
                continue;
            }

            match result {
                Ok(Some(unit)) => trace!(track, size = unit.data.len(), "discarding unit before codec data"),
                Ok(None) => {}
                Err(RtspError::CodecParametersChanged { .. }) => {
                    if let Err(e) = stream.derive_codec_params() {
                        debug!(track, error = %e, "re-derivation failed");
                    }
                }
                Err(e) => debug!(track, error = %e, "ignoring error before codec data"),
            }
            if self.streams.iter().all(Stream::is_codec_ready) {
                self.transition(SessionState::ReadyForMedia);
            }
        }
    }

    /// Re-derive codec parameters for `track` after
    /// [`CodecParametersChanged`](RtspError::CodecParametersChanged).
    pub fn rederive_codec_params(&mut self, track: usize) -> Result<&CodecParams> {
        let stream = self.streams.get_mut(track).ok_or_else(|| {
            RtspError::InvalidDescriptor(format!("no track {track} in description"))
        })?;
        stream.derive_codec_params()
    }

    /// TEARDOWN (best effort) and return to [`SessionState::Initial`].
    pub async fn teardown(&mut self) -> Result<()> {
        if self.state != SessionState::Initial {
            let request = RtspRequest::new(Method::Teardown, &self.aggregate_uri());
            match self.exchange(request).await {
                Ok(response) if !response.is_success() => {
                    warn!(status = response.status_code, "TEARDOWN refused")
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "TEARDOWN failed"),
            }
        }
        self.streams.clear();
        self.set_up.clear();
        self.session_id = None;
        self.server_timeout = None;
        self.content_base = None;
        self.transition(SessionState::Initial);
        Ok(())
    }

    /// Send a request and wait for its response, answering one digest
    /// challenge on the way.
    ///
    /// `CSeq`, `User-Agent`, `Session` and `Authorization` are filled in.
    /// A 401 caches the challenge and the request is resent once; a second
    /// 401, or a challenge without credentials to answer it, fails with
    /// [`AuthenticationRequired`](RtspError::AuthenticationRequired).
    pub async fn exchange(&mut self, request: RtspRequest) -> Result<RtspResponse> {
        let response = self.round_trip(request.clone()).await?;
        if response.status_code != STATUS_UNAUTHORIZED {
            return Ok(response);
        }

        if !self.auth.observe(&response) || !self.auth.has_credentials() {
            warn!(method = %request.method, "server requires authentication");
            return Err(RtspError::AuthenticationRequired);
        }
        debug!(method = %request.method, realm = self.auth.realm(), "retrying with digest");

        let retry = self.round_trip(request).await?;
        if retry.status_code == STATUS_UNAUTHORIZED {
            self.auth.observe(&retry);
            return Err(RtspError::AuthenticationRequired);
        }
        Ok(retry)
    }

    async fn round_trip(&mut self, request: RtspRequest) -> Result<RtspResponse> {
        let cseq = self.send(request).await?;
        self.await_response(cseq).await
    }

    async fn send(&mut self, mut request: RtspRequest) -> Result<u32> {
        self.cseq += 1;
        let cseq = self.cseq;
        request.headers.set("CSeq", &cseq.to_string());
        request.headers.set("User-Agent", &self.config.user_agent);
        if let Some(id) = &self.session_id {
            request.headers.set("Session", id);
        }
        if let Some(authorization) = self.auth.authorization(request.method.as_str(), &request.uri) {
            request.headers.set("Authorization", &authorization);
        }

        debug!(method = %request.method, uri = %request.uri, cseq, "request");
        self.writer.write_all(&request.encode()).await?;
        self.writer.flush().await?;
        Ok(cseq)
    }

    /// Wait for the response carrying `cseq`, racing the error queue.
    ///
    /// Once media is playing, RTP and RTCP arriving meanwhile are dropped so
    /// the demultiplexer can get past them to the response.
    async fn await_response(&mut self, cseq: u32) -> Result<RtspResponse> {
        let playing = self.state >= SessionState::AwaitingCodecData;
        loop {
            let response = tokio::select! {
                Some(response) = self.queues.responses.recv() => response,
                Some(error) = self.queues.errors.recv() => return Err(error),
                Some((track, packet)) = self.queues.rtp.recv(), if playing => {
                    trace!(track, seq = packet.sequence_number, "dropping RTP while awaiting response");
                    continue;
                }
                Some(rtcp) = self.queues.rtcp.recv(), if playing => {
                    trace!(track = rtcp.track, "dropping RTCP while awaiting response");
                    continue;
                }
                else => return Err(RtspError::ConnectionClosed),
            };

            match response.cseq() {
                Some(got) if got != cseq => {
                    debug!(expected = cseq, got, "dropping unmatched response");
                    continue;
                }
                _ => {}
            }
            debug!(cseq, status = response.status_code, reason = %response.status_text, "response");
            self.note_session(&response);
            return Ok(response);
        }
    }

    /// Next RTP packet, draining late responses, RTCP and non-fatal errors
    /// on the way.
    async fn next_rtp(&mut self) -> Result<(usize, crate::media::RtpPacket)> {
        loop {
            tokio::select! {
                biased;
                Some(error) = self.queues.errors.recv() => {
                    if error.is_fatal() {
                        return Err(error);
                    }
                    warn!(error = %error, "transport error while reading media");
                }
                Some(response) = self.queues.responses.recv() => {
                    debug!(cseq = ?response.cseq(), status = response.status_code, "late response");
                    if response.status_code == STATUS_UNAUTHORIZED {
                        self.auth.observe(&response);
                    }
                }
                Some(rtcp) = self.queues.rtcp.recv() => {
                    trace!(track = rtcp.track, size = rtcp.data.len(), "RTCP");
                }
                Some(item) = self.queues.rtp.recv() => return Ok(item),
                else => return Err(RtspError::ConnectionClosed),
            }
        }
    }

    async fn keepalive_if_due(&mut self) {
        if self.last_keepalive.elapsed() < self.keepalive_interval() {
            return;
        }
        self.last_keepalive = Instant::now();
        let request = RtspRequest::new(Method::GetParameter, &self.aggregate_uri());
        match self.send(request).await {
            Ok(cseq) => trace!(cseq, "keep-alive sent"),
            Err(e) => warn!(error = %e, "keep-alive failed"),
        }
    }

    fn note_session(&mut self, response: &RtspResponse) {
        if !response.is_success() {
            return;
        }
        let Some(value) = response.get_header("Session") else {
            return;
        };
        let (id, timeout) = parse_session_header(value);
        if let Some(current) = &self.session_id {
            if *current != id {
                debug!(current = %current, announced = %id, "ignoring different session id");
            }
        } else {
            info!(session_id = %id, ?timeout, "session established");
            self.session_id = Some(id);
        }
        if timeout.is_some() {
            self.server_timeout = timeout;
        }
    }

    fn expect_state(&self, operation: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RtspError::ProtocolState {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn transition(&mut self, state: SessionState) {
        debug!(from = %self.state, to = %state, "session state");
        self.state = state;
    }

    /// Target for session-wide requests (PLAY, keep-alive, TEARDOWN).
    fn aggregate_uri(&self) -> String {
        self.content_base.as_ref().unwrap_or(&self.url).as_str().to_string()
    }

    /// Resolve a track's `a=control` against the content base.
    ///
    /// Relative controls are appended as a path segment, the way RTSP
    /// servers expect, rather than replacing the last one.
    fn track_uri(&self, control: &str) -> String {
        let base = self.aggregate_uri();
        let control = control.trim();
        if control.is_empty() || control == "*" {
            return base;
        }
        let lower = control.to_ascii_lowercase();
        if lower.starts_with("rtsp://") || lower.starts_with("rtsps://") {
            return control.to_string();
        }
        if base.ends_with('/') {
            format!("{base}{control}")
        } else {
            format!("{base}/{control}")
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("cseq", &self.cseq)
            .field("tracks", &self.streams.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.demux.abort();
    }
}

fn check_success(method: Method, response: RtspResponse) -> Result<RtspResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(RtspError::RequestFailed {
            method: method.as_str(),
            status: response.status_code,
            reason: response.status_text,
        })
    }
}

/// Split an RTSP URL into the request target and its credentials.
fn parse_url(raw: &str) -> Result<(Url, Option<Credentials>)> {
    let mut url = Url::parse(raw).map_err(|e| RtspError::InvalidUrl(format!("{raw}: {e}")))?;
    if !url.scheme().eq_ignore_ascii_case("rtsp") {
        return Err(RtspError::InvalidUrl(format!(
            "{raw}: scheme must be rtsp, got {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(RtspError::InvalidUrl(format!("{raw}: missing host")));
    }

    let decode = |s: &str| percent_decode_str(s).decode_utf8_lossy().into_owned();
    let credentials = (!url.username().is_empty()).then(|| Credentials {
        username: decode(url.username()),
        password: url.password().map(decode).unwrap_or_default(),
    });
    if url.set_username("").is_err() || url.set_password(None).is_err() {
        return Err(RtspError::InvalidUrl(format!("{raw}: cannot strip credentials")));
    }
    Ok((url, credentials))
}

/// `Session: <id>[;timeout=<seconds>]` (RFC 2326 §12.37).
fn parse_session_header(value: &str) -> (String, Option<Duration>) {
    let mut parts = value.split(';');
    let id = parts.next().unwrap_or_default().trim().to_string();
    let timeout = parts
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("timeout"))
        .and_then(|(_, secs)| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    (id, timeout)
}
