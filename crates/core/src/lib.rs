//! Core types, events, errors, and configuration for chatdeck
//!
//! This crate provides the data model shared by the realtime simulator and
//! its drivers: the closed set of realtime events with their payloads, the
//! simulation config, and the error taxonomy.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod types;

// Re-exports for convenience
pub use config::{ChatdeckConfig, DelayWindow, LogLevel, RealtimeConfig, ReconnectPolicy};
pub use error::{Error, Result};
pub use events::{EventKind, RealtimeEvent};
pub use types::*;
