use tokio::sync::mpsc::{Receiver, Sender};

use crate::events::{Broker, Event};
use crate::session::SessionConfig;

pub type ClientId = u128;
/// Broker side of a client's delivery queue.
pub type Queue = Sender<Event>;
/// Session side of a client's delivery queue.
pub type Inbox = Receiver<Event>;

/// Everything a request handler needs, cloned into each connection.
#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Broker,
    pub session: SessionConfig,
}
