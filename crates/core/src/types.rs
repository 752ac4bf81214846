use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current UTC time in unix milliseconds, used in generated ids.
pub fn now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// UI panel a message is routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetPanel(String);

impl TargetPanel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetPanel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TargetPanel {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A message as handed to the service by the UI.
///
/// `id` and `timestamp` are optional; the service fills them in when absent.
/// Any other fields are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Client-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Client-assigned ISO-8601 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Arbitrary payload fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OutgoingMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a message with a single `content` field.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new().with_field("content", Value::String(content.into()))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// A message after the service accepted it: id, timestamp and panel are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    pub timestamp: String,
    pub target_panel: TargetPanel,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SentMessage {
    /// Complete a draft. `make_id` is only called when the draft has no id.
    pub fn from_draft(
        draft: OutgoingMessage,
        target_panel: TargetPanel,
        make_id: impl FnOnce() -> String,
    ) -> Self {
        let OutgoingMessage {
            id,
            timestamp,
            mut fields,
        } = draft;

        // Reserved keys would serialize twice next to the typed fields.
        for reserved in ["id", "timestamp", "targetPanel"] {
            fields.remove(reserved);
        }

        Self {
            id: id.filter(|id| !id.is_empty()).unwrap_or_else(make_id),
            timestamp: timestamp
                .filter(|ts| !ts.is_empty())
                .unwrap_or_else(now_iso8601),
            target_panel,
            fields,
        }
    }
}

/// Delivery status carried by a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The simulated server accepted the message.
    Delivered,
}

/// Simulated server acknowledgement for a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub original_message_id: String,
    pub receipt_id: String,
    pub timestamp: String,
    pub status: DeliveryStatus,
}

/// One named unit of a multi-stage simulated task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    pub name: String,

    /// Extra step fields supplied by the UI, echoed back on completion.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessingStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }
}

impl From<&str> for ProcessingStep {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Snapshot emitted when processing starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSnapshot {
    pub message_id: String,
    pub start_time: String,
    pub steps: Vec<ProcessingStep>,
    pub current_step: usize,
}

/// Status of a reported step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
}

/// Progress report for a single processing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    pub message_id: String,
    pub current_step: usize,
    pub step_name: String,
    pub step_status: StepStatus,
    pub timestamp: String,
}

/// Final report once every step has been signaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingCompletion {
    pub message_id: String,
    pub completion_time: String,
    pub steps: Vec<ProcessingStep>,
}

/// Connection transition payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStateChange {
    pub connected: bool,

    /// New id when connecting, the id being torn down otherwise.
    pub connection_id: Option<String>,
}

/// Machine-readable code of an `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The reconnect loop ran out of attempts.
    MaxReconnectAttempts,
}

impl ErrorCode {
    /// Wire form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MaxReconnectAttempts => "MAX_RECONNECT_ATTEMPTS",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// Read-only view of the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub connected: bool,
    pub connection_id: Option<String>,
    pub reconnect_attempts: u32,
}
