//! Wire formats for events: SSE text frames and WebSocket JSON envelopes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use serde_json::value::{to_raw_value, RawValue};

use super::event::Event;

pub const CONNECTED: &str = "connected";

/// Sent on SSE streams while idle; a comment line, ignored by `EventSource`.
pub const SSE_KEEPALIVE: &str = ": keep-alive\n\n";

static LAST_MESSAGE_ID: AtomicU64 = AtomicU64::new(0);

/// Nanosecond clock reading, bumped when the clock has not advanced since the
/// previous call, so ids never go backwards within the process.
pub fn next_message_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default();
    let previous = LAST_MESSAGE_ID
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1).to_string()
}

pub fn sse_frame(event: &Event) -> serde_json::Result<String> {
    let data = event.payload().to_json()?;
    Ok(format!("event: {}\ndata: {}\n\n", event.kind(), data.get()))
}

pub fn sse_connected() -> String {
    format!("event: {}\ndata: {{\"status\":\"connected\"}}\n\n", CONNECTED)
}

/// The payload text is embedded as is.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Box<RawValue>,
    pub timestamp: DateTime<Utc>,
    pub id: String,
}

impl Envelope {
    fn now(kind: impl Into<String>, data: Box<RawValue>) -> Self {
        Envelope {
            kind: kind.into(),
            data,
            timestamp: Utc::now(),
            id: next_message_id(),
        }
    }

    pub fn connected() -> serde_json::Result<Self> {
        let data = to_raw_value(&json!({ "status": "connected" }))?;
        Ok(Envelope::now(CONNECTED, data))
    }

    pub fn from_event(event: &Event) -> serde_json::Result<Self> {
        let data = event.payload().to_json()?;
        Ok(Envelope::now(event.kind().as_str(), data))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn ws_message(event: &Event) -> serde_json::Result<String> {
    Envelope::from_event(event)?.to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use serde::ser::{Error as _, Serializer};
    use serde_json::Value;

    #[derive(Debug, Serialize)]
    struct Step {
        title: String,
        id: String,
        position: u32,
    }

    #[derive(Debug, Serialize)]
    struct Counter {
        total: u128,
    }

    fn step() -> Step {
        Step {
            title: "deploy".into(),
            id: "s1".into(),
            position: 2,
        }
    }

    #[derive(Debug)]
    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not serializable"))
        }
    }

    #[test]
    fn sse_frame_layout() {
        let event = Event::new(EventType::StepCreated, json!({"id": "s1"}));
        assert_eq!(
            sse_frame(&event).unwrap(),
            "event: step:created\ndata: {\"id\":\"s1\"}\n\n"
        );
    }

    #[test]
    fn sse_connected_frame() {
        assert_eq!(
            sse_connected(),
            "event: connected\ndata: {\"status\":\"connected\"}\n\n"
        );
    }

    #[test]
    fn ws_envelope_fields() {
        let event = Event::new(EventType::PlanDeleted, json!({"id": "p1"}));
        let text = ws_message(&event).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "plan:deleted");
        assert_eq!(value["data"], json!({"id": "p1"}));
        assert!(value["id"].as_str().is_some_and(|id| !id.is_empty()));
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn struct_fields_keep_declaration_order() {
        let event = Event::new(EventType::StepCreated, step());
        assert_eq!(
            sse_frame(&event).unwrap(),
            "event: step:created\ndata: {\"title\":\"deploy\",\"id\":\"s1\",\"position\":2}\n\n"
        );
        let text = ws_message(&event).unwrap();
        assert!(
            text.contains(r#""data":{"title":"deploy","id":"s1","position":2}"#),
            "{}",
            text
        );
    }

    #[test]
    fn integers_wider_than_64_bits_are_written() {
        let total = u64::MAX as u128 + 1;
        let event = Event::new(EventType::PlanUpdated, Counter { total });
        assert_eq!(
            sse_frame(&event).unwrap(),
            "event: plan:updated\ndata: {\"total\":18446744073709551616}\n\n"
        );
        let text = ws_message(&event).unwrap();
        assert!(text.contains(r#""data":{"total":18446744073709551616}"#), "{}", text);
    }

    #[test]
    fn connected_envelope() {
        let text = Envelope::connected().unwrap().to_json().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], CONNECTED);
        assert_eq!(value["data"], json!({"status": "connected"}));
    }

    #[test]
    fn unserializable_payload_fails_per_event() {
        let event = Event::new(EventType::StepUpdated, Unserializable);
        assert!(sse_frame(&event).is_err());
        assert!(ws_message(&event).is_err());
    }

    #[test]
    fn message_ids_increase() {
        let ids: Vec<u64> = (0..1000)
            .map(|_| next_message_id().parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
