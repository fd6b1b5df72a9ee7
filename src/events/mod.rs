mod broker;
mod event;
pub mod format;

pub use broker::{Broker, BrokerConfig, Dispatcher, Subscription, DEFAULT_INTAKE_CAPACITY};
pub use event::{Event, EventType, Payload, UnknownEventType};
