//! Simulation timing constants and configuration defaults.

/// Simulated latency of a connect handshake, in milliseconds.
pub const DEFAULT_CONNECT_LATENCY_MS: u64 = 500;

/// Simulated latency of a disconnect, in milliseconds.
pub const DEFAULT_DISCONNECT_LATENCY_MS: u64 = 300;

/// Jitter window before a sent message is echoed back.
pub const DEFAULT_SEND_DELAY_MS: (u64, u64) = (100, 400);

/// Jitter window before the server receipt for a message arrives.
pub const DEFAULT_RECEIPT_DELAY_MS: (u64, u64) = (200, 700);

/// Fixed delay before processing is reported as started.
pub const DEFAULT_PROCESSING_START_DELAY_MS: u64 = 200;

/// Jitter window before the first processing step completes.
pub const DEFAULT_FIRST_STEP_DELAY_MS: (u64, u64) = (200, 700);

/// Jitter window between later steps and before completion.
pub const DEFAULT_STEP_DELAY_MS: (u64, u64) = (500, 1500);

/// Heartbeat period, in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 10_000;

/// Probability that a heartbeat detects a dropped link.
pub const DEFAULT_CONNECTION_LOSS_PROBABILITY: f64 = 0.05;

/// Reconnect attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// First reconnect delay, in milliseconds.
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 2000;

/// Multiplier applied to the reconnect delay per attempt.
pub const DEFAULT_RECONNECT_GROWTH_FACTOR: f64 = 1.5;

/// Configuration file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the platform config dir.
pub const APP_DIR_NAME: &str = "chatdeck";

/// Prefix of generated connection ids.
pub const CONNECTION_ID_PREFIX: &str = "conn";

/// Prefix of generated message ids.
pub const MESSAGE_ID_PREFIX: &str = "msg";

/// Prefix of generated receipt ids.
pub const RECEIPT_ID_PREFIX: &str = "receipt";
