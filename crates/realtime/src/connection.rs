//! Connection state machine.
//!
//! Holds the connected flag, the current id and the reconnect attempt
//! counter, plus the handles of the timers tied to the connection. The id is
//! present exactly when the connection is up.

use std::time::Duration;

use chatdeck_core::{ConnectionSnapshot, ReconnectPolicy};
use tokio::task::AbortHandle;

/// What the reconnect loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Wait `delay`, then try again as attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    /// The policy ran out after `attempts` tries.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct Connection {
    connected: bool,
    connection_id: Option<String>,
    reconnect_attempts: u32,
    heartbeat: Option<AbortHandle>,
    reconnect: Option<AbortHandle>,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            connected: self.connected,
            connection_id: self.connection_id.clone(),
            reconnect_attempts: self.reconnect_attempts,
        }
    }

    /// Move to Connected under `id`.
    ///
    /// Resets the attempt counter and cancels any stale heartbeat or pending
    /// reconnect. Returns false, changing nothing, if already connected.
    pub fn establish(&mut self, id: String) -> bool {
        if self.connected {
            return false;
        }
        cancel(&mut self.heartbeat);
        cancel(&mut self.reconnect);
        self.connected = true;
        self.connection_id = Some(id);
        self.reconnect_attempts = 0;
        true
    }

    /// Move to Disconnected, stopping the heartbeat. Returns the id that was
    /// torn down, or `None` if there was no live connection.
    pub fn drop_link(&mut self) -> Option<String> {
        if !self.connected {
            return None;
        }
        cancel(&mut self.heartbeat);
        self.connected = false;
        self.connection_id.take()
    }

    /// Count one more reconnect attempt, or report that the policy is spent.
    pub fn next_reconnect(&mut self, policy: &ReconnectPolicy) -> ReconnectStep {
        if self.reconnect_attempts >= policy.max_attempts {
            return ReconnectStep::Exhausted {
                attempts: self.reconnect_attempts,
            };
        }
        self.reconnect_attempts += 1;
        ReconnectStep::Retry {
            attempt: self.reconnect_attempts,
            delay: policy.delay_for(self.reconnect_attempts),
        }
    }

    /// Track the heartbeat timer of the current connection.
    pub fn arm_heartbeat(&mut self, handle: AbortHandle) {
        cancel(&mut self.heartbeat);
        self.heartbeat = Some(handle);
    }

    /// Track the running reconnect loop.
    pub fn arm_reconnect(&mut self, handle: AbortHandle) {
        cancel(&mut self.reconnect);
        self.reconnect = Some(handle);
    }

    /// Cancel every timer and forget the connection without a transition.
    pub fn reset(&mut self) {
        cancel(&mut self.heartbeat);
        cancel(&mut self.reconnect);
        *self = Self::default();
    }
}

fn cancel(slot: &mut Option<AbortHandle>) {
    if let Some(handle) = slot.take() {
        handle.abort();
    }
}
