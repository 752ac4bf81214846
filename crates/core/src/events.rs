//! Realtime event kinds and their typed payloads.
//!
//! The set of kinds is closed; every kind has exactly one payload shape.

use crate::types::{
    ConnectionStateChange, ErrorPayload, ProcessingCompletion, ProcessingSnapshot, Receipt,
    SentMessage, StepUpdate,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag used to subscribe to a family of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageReceived,
    MessageSent,
    ConnectionStateChanged,
    ProcessingStarted,
    ProcessingCompleted,
    ProcessingStepUpdated,
    Error,
}

impl EventKind {
    /// Every recognized kind, in declaration order.
    pub const ALL: [EventKind; 7] = [
        EventKind::MessageReceived,
        EventKind::MessageSent,
        EventKind::ConnectionStateChanged,
        EventKind::ProcessingStarted,
        EventKind::ProcessingCompleted,
        EventKind::ProcessingStepUpdated,
        EventKind::Error,
    ];

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageReceived => "message_received",
            EventKind::MessageSent => "message_sent",
            EventKind::ConnectionStateChanged => "connection_state_changed",
            EventKind::ProcessingStarted => "processing_started",
            EventKind::ProcessingCompleted => "processing_completed",
            EventKind::ProcessingStepUpdated => "processing_step_updated",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::Error::Parse(format!("Unknown event type: {}", s)))
    }
}

/// An event delivered through the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// Server receipt for a previously sent message.
    MessageReceived(Receipt),
    /// A message left the client.
    MessageSent(SentMessage),
    ConnectionStateChanged(ConnectionStateChange),
    ProcessingStarted(ProcessingSnapshot),
    ProcessingCompleted(ProcessingCompletion),
    ProcessingStepUpdated(StepUpdate),
    Error(ErrorPayload),
}

impl RealtimeEvent {
    /// Kind this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::MessageReceived(_) => EventKind::MessageReceived,
            RealtimeEvent::MessageSent(_) => EventKind::MessageSent,
            RealtimeEvent::ConnectionStateChanged(_) => EventKind::ConnectionStateChanged,
            RealtimeEvent::ProcessingStarted(_) => EventKind::ProcessingStarted,
            RealtimeEvent::ProcessingCompleted(_) => EventKind::ProcessingCompleted,
            RealtimeEvent::ProcessingStepUpdated(_) => EventKind::ProcessingStepUpdated,
            RealtimeEvent::Error(_) => EventKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCode, ErrorPayload};
    use serde_json::json;

    #[test]
    fn kind_names_parse_back() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                json!(kind.as_str())
            );
        }
        assert!("message_deleted".parse::<EventKind>().is_err());
    }

    #[test]
    fn event_serializes_as_tagged_union() {
        let event = RealtimeEvent::ConnectionStateChanged(ConnectionStateChange {
            connected: true,
            connection_id: Some("conn_1_0".to_string()),
        });

        assert_eq!(event.kind(), EventKind::ConnectionStateChanged);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "connection_state_changed",
                "data": {"connected": true, "connectionId": "conn_1_0"}
            })
        );
    }

    #[test]
    fn error_event_kind_matches_tag() {
        let event = RealtimeEvent::Error(ErrorPayload {
            code: ErrorCode::MaxReconnectAttempts,
            message: "Failed to reconnect after maximum attempts".to_string(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!(event.kind().as_str()));
    }
}
