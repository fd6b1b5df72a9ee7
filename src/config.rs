use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::events::{BrokerConfig, DEFAULT_INTAKE_CAPACITY};
use crate::session::{SessionConfig, DEFAULT_SSE_QUEUE_CAPACITY, DEFAULT_WS_QUEUE_CAPACITY};

/// Live event stream server: SSE on /events, WebSocket on /ws.
#[derive(Parser, Debug, Clone)]
#[command(name = "live-events", version)]
pub struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8081", env = "LIVE_EVENTS_ADDR")]
    pub addr: SocketAddr,

    /// Events buffered between producers and the broker
    #[arg(long, default_value_t = DEFAULT_INTAKE_CAPACITY, env = "LIVE_EVENTS_INTAKE_CAPACITY")]
    pub intake_capacity: usize,

    /// Per-client queue size for SSE streams
    #[arg(long, default_value_t = DEFAULT_SSE_QUEUE_CAPACITY, env = "LIVE_EVENTS_SSE_QUEUE")]
    pub sse_queue: usize,

    /// Per-client queue size for WebSocket streams
    #[arg(long, default_value_t = DEFAULT_WS_QUEUE_CAPACITY, env = "LIVE_EVENTS_WS_QUEUE")]
    pub ws_queue: usize,

    /// Seconds between keepalive comments / pings
    #[arg(long, default_value_t = 30, env = "LIVE_EVENTS_HEARTBEAT_SECS")]
    pub heartbeat_secs: u64,

    /// Seconds a WebSocket may stay silent before it is closed
    #[arg(long, default_value_t = 60, env = "LIVE_EVENTS_READ_TIMEOUT_SECS")]
    pub read_timeout_secs: u64,

    /// Seconds a single write may take
    #[arg(long, default_value_t = 10, env = "LIVE_EVENTS_WRITE_TIMEOUT_SECS")]
    pub write_timeout_secs: u64,
}

impl Args {
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            intake_capacity: self.intake_capacity,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sse_queue_capacity: self.sse_queue,
            ws_queue_capacity: self.ws_queue,
            heartbeat: Duration::from_secs(self.heartbeat_secs.max(1)),
            read_timeout: Duration::from_secs(self.read_timeout_secs.max(1)),
            write_timeout: Duration::from_secs(self.write_timeout_secs.max(1)),
        }
    }
}
