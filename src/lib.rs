//! Real-time event broker with Server-Sent Events and WebSocket streaming.
//!
//! Producers call [`Broker::emit`](events::Broker::emit); every connected
//! viewer receives the event on its own bounded queue, and a viewer that
//! falls behind loses events instead of slowing anyone else down.

pub mod config;
mod endpoints;
pub mod events;
pub mod server;
pub mod session;
pub mod shared;
mod utils;
pub mod ws;
