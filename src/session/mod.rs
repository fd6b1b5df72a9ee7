//! Per-connection streaming sessions.
//!
//! A session owns one [`Subscription`](crate::events::Subscription) and writes
//! what arrives on it to a transport until something ends the connection.
//! Ownership of the subscription is the cleanup guarantee: however the session
//! returns, dropping it unregisters the queue, and dropping the transport
//! closes the connection.

use std::io;
use std::time::Duration;

use tracing::{info, warn};

use crate::shared::types::ClientId;
use crate::ws::FrameError;

pub mod sse;
pub mod ws;

pub const DEFAULT_SSE_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_WS_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sse_queue_capacity: usize,
    pub ws_queue_capacity: usize,
    /// SSE keepalive comment / WebSocket ping interval.
    pub heartbeat: Duration,
    /// WebSocket only; refreshed by any inbound frame.
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            sse_queue_capacity: DEFAULT_SSE_QUEUE_CAPACITY,
            ws_queue_capacity: DEFAULT_WS_QUEUE_CAPACITY,
            heartbeat: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a session ended.
#[derive(Debug, thiserror::Error)]
pub enum Disconnect {
    #[error("broker closed the delivery queue")]
    Unsubscribed,
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("no traffic from peer within the read deadline")]
    ReadTimeout,
    #[error("write did not complete within the write deadline")]
    WriteTimeout,
    #[error("outbound buffer full, client evicted")]
    Backpressure,
    #[error("protocol error: {0}")]
    Protocol(FrameError),
    #[error(transparent)]
    Io(io::Error),
}

impl Disconnect {
    /// Endings that need no operator attention.
    pub fn is_clean(&self) -> bool {
        matches!(self, Disconnect::Unsubscribed | Disconnect::PeerClosed)
    }

    pub fn log_end(&self, id: ClientId, transport: &'static str) {
        if self.is_clean() {
            info!(client_id = %id, transport, reason = %self, "client disconnected");
        } else {
            warn!(client_id = %id, transport, reason = %self, "client dropped");
        }
    }
}

impl From<io::Error> for Disconnect {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Disconnect::PeerClosed,
            _ => Disconnect::Io(err),
        }
    }
}

impl From<FrameError> for Disconnect {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(err) => err.into(),
            other => Disconnect::Protocol(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_counts_as_peer_close() {
        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Disconnect::from(err), Disconnect::PeerClosed));
        let err = FrameError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(Disconnect::from(err).is_clean());
    }

    #[test]
    fn protocol_errors_are_not_clean() {
        let reason = Disconnect::from(FrameError::Unmasked);
        assert!(matches!(reason, Disconnect::Protocol(FrameError::Unmasked)));
        assert!(!reason.is_clean());
    }
}
