//! Realtime session simulator for chatdeck
//!
//! Simulates the client side of a persistent chat connection entirely
//! in-process: connect and disconnect with latency, a heartbeat that may
//! detect a dropped link, reconnects with exponential backoff, delivery
//! receipts for sent messages, and step-by-step processing progress. Every
//! outcome is published on an [`EventBus`] keyed by event kind.

pub mod bus;
pub mod connection;
pub mod network;
pub mod service;
pub mod session;

mod ids;

// Re-exports for convenience
pub use bus::{EventBus, Listener, Subscription};
pub use connection::{Connection, ReconnectStep};
pub use network::{NetworkConditions, ScriptedNetwork, SimulatedNetwork};
pub use service::RealtimeService;
pub use session::{Advance, ProcessingSession};
