//! Error types for chatdeck core functionality.

use thiserror::Error;

/// Main error type for chatdeck.
#[derive(Error, Debug)]
pub enum Error {
    /// A send or processing call was made while disconnected.
    #[error("Not connected to server")]
    NotConnected,

    /// The service was disposed and no longer accepts calls.
    #[error("Realtime service has been disposed")]
    Disposed,

    /// A reconnect handshake was refused by the network model.
    #[error("Reconnect attempt {attempt} failed: {reason}")]
    Redial {
        /// 1-based attempt number within the current backoff run.
        attempt: u32,
        /// Human readable reason.
        reason: String,
    },

    /// A subscriber callback failed while handling an event.
    #[error("Listener fault in {event}: {reason}")]
    ListenerFault {
        /// Event kind being delivered.
        event: String,
        /// Error or panic message.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Data parsing error: {0}")]
    Parse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for chatdeck operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a redial error for the given attempt.
    pub fn redial(attempt: u32, reason: impl Into<String>) -> Self {
        Self::Redial {
            attempt,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_message_matches_ui_text() {
        assert_eq!(Error::NotConnected.to_string(), "Not connected to server");
    }

    #[test]
    fn redial_error_carries_attempt() {
        let err = Error::redial(3, "link refused");
        assert_eq!(err.to_string(), "Reconnect attempt 3 failed: link refused");
    }
}
