use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "plan:created")]
    PlanCreated,
    #[serde(rename = "plan:updated")]
    PlanUpdated,
    #[serde(rename = "plan:deleted")]
    PlanDeleted,
    #[serde(rename = "step:created")]
    StepCreated,
    #[serde(rename = "step:updated")]
    StepUpdated,
    #[serde(rename = "step:deleted")]
    StepDeleted,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::PlanCreated,
        EventType::PlanUpdated,
        EventType::PlanDeleted,
        EventType::StepCreated,
        EventType::StepUpdated,
        EventType::StepDeleted,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::PlanCreated => "plan:created",
            EventType::PlanUpdated => "plan:updated",
            EventType::PlanDeleted => "plan:deleted",
            EventType::StepCreated => "step:created",
            EventType::StepUpdated => "step:updated",
            EventType::StepDeleted => "step:deleted",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown event type `{0}`")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Anything that can be rendered as the JSON `data` of an event.
///
/// Serialization happens late, in the session that writes the event, so a
/// payload that fails to serialize only costs that one frame. The result is
/// the serializer's own text, with field order and wide integers untouched.
pub trait Payload: fmt::Debug + Send + Sync {
    fn to_json(&self) -> serde_json::Result<Box<RawValue>>;
}

impl<T> Payload for T
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn to_json(&self) -> serde_json::Result<Box<RawValue>> {
        serde_json::value::to_raw_value(self)
    }
}

/// An immutable state change. Cloning shares the payload.
#[derive(Debug, Clone)]
pub struct Event {
    kind: EventType,
    payload: Arc<dyn Payload>,
}

impl Event {
    pub fn new<P: Payload + 'static>(kind: EventType, payload: P) -> Self {
        Event {
            kind,
            payload: Arc::new(payload),
        }
    }

    pub fn kind(&self) -> EventType {
        self.kind
    }

    pub fn payload(&self) -> &dyn Payload {
        &*self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_round_trip() {
        for kind in EventType::ALL {
            assert_eq!(kind.as_str().parse::<EventType>(), Ok(kind));
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert_eq!(
            "workflow:started".parse::<EventType>(),
            Err(UnknownEventType("workflow:started".into()))
        );
    }

    #[test]
    fn clones_share_payload() {
        let event = Event::new(EventType::StepCreated, json!({"id": "s1"}));
        let copy = event.clone();
        assert!(Arc::ptr_eq(&event.payload, &copy.payload));
        assert_eq!(copy.payload().to_json().unwrap().get(), r#"{"id":"s1"}"#);
    }
}
