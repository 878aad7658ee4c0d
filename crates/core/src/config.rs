//! Client configuration: identification, queue sizing, keep-alive and
//! timestamp limits.

use std::time::Duration;

use crate::media::stream::{DEFAULT_CLOCK_RATE, DEFAULT_MAX_TIMESTAMP_JUMP};
use crate::transport::QueueCapacity;

/// Client-level configuration, owned by each [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Sent as `User-Agent` on every request.
    pub user_agent: String,
    /// Capacity of the response, RTP and RTCP queues fed by the demultiplexer.
    pub queue_capacity: usize,
    /// Capacity of the transport-error queue.
    pub error_queue_capacity: usize,
    /// Upper bound between keep-alive requests while media flows.
    pub keepalive_interval: Duration,
    /// Largest forward step allowed between presentation times on a track.
    pub max_timestamp_jump: Duration,
    /// Clock rate for tracks that advertise none.
    pub default_clock_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("rtsp-client/{}", env!("CARGO_PKG_VERSION")),
            queue_capacity: 10,
            error_queue_capacity: 100,
            keepalive_interval: Duration::from_secs(30),
            max_timestamp_jump: DEFAULT_MAX_TIMESTAMP_JUMP,
            default_clock_rate: DEFAULT_CLOCK_RATE,
        }
    }
}

impl ClientConfig {
    pub(crate) fn queues(&self) -> QueueCapacity {
        QueueCapacity {
            messages: self.queue_capacity,
            errors: self.error_queue_capacity,
        }
    }

    /// Keep-alive period given the timeout advertised in the `Session`
    /// header: half the server timeout when that is shorter, never below
    /// one second.
    pub fn keepalive_for(&self, server_timeout: Option<Duration>) -> Duration {
        let interval = match server_timeout {
            Some(timeout) => self.keepalive_interval.min(timeout / 2),
            None => self.keepalive_interval,
        };
        interval.max(Duration::from_secs(1))
    }
}
