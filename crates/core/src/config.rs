use crate::constants::*;
use crate::Error;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for chatdeck.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ChatdeckConfig {
    /// Realtime simulation timing and retry policy.
    pub realtime: RealtimeConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Timing and retry policy of the realtime simulator.
///
/// All durations are stored in milliseconds so the TOML stays readable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Latency of a connect handshake.
    pub connect_latency_ms: u64,

    /// Latency of a disconnect.
    pub disconnect_latency_ms: u64,

    /// Delay before a sent message is echoed.
    pub send_delay_ms: DelayWindow,

    /// Delay before the delivery receipt arrives.
    pub receipt_delay_ms: DelayWindow,

    /// Delay before processing is reported as started.
    pub processing_start_delay_ms: u64,

    /// Delay before the first processing step completes.
    pub first_step_delay_ms: DelayWindow,

    /// Delay between later steps, and before completion.
    pub step_delay_ms: DelayWindow,

    /// Heartbeat period.
    pub heartbeat_interval_ms: u64,

    /// Chance that a heartbeat finds the link dropped.
    pub connection_loss_probability: f64,

    /// Reconnect backoff policy.
    pub reconnect: ReconnectPolicy,
}

/// Half-open jitter window `[min_ms, max_ms)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayWindow {
    /// Lower bound, inclusive.
    pub min_ms: u64,

    /// Upper bound, exclusive unless equal to `min_ms`.
    pub max_ms: u64,
}

/// Exponential backoff policy for reconnects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Attempts before the loop gives up.
    pub max_attempts: u32,

    /// Delay before the first attempt.
    pub base_delay_ms: u64,

    /// Multiplier per attempt.
    pub growth_factor: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level.
    Error,

    /// Warning level.
    Warn,

    /// Info level.
    Info,

    /// Debug level.
    Debug,

    /// Trace level.
    Trace,
}

impl ChatdeckConfig {
    /// Default configuration file location.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?;

        Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::FileSystem(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Save configuration to file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Parse(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every section for values the simulator cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.realtime.validate()
    }
}

impl RealtimeConfig {
    /// Reject configurations the simulator cannot run with.
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("send_delay_ms", self.send_delay_ms),
            ("receipt_delay_ms", self.receipt_delay_ms),
            ("first_step_delay_ms", self.first_step_delay_ms),
            ("step_delay_ms", self.step_delay_ms),
        ];
        for (name, window) in windows {
            if window.min_ms > window.max_ms {
                return Err(Error::config(format!(
                    "{}: min_ms ({}) exceeds max_ms ({})",
                    name, window.min_ms, window.max_ms
                )));
            }
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(Error::config("heartbeat_interval_ms must be positive"));
        }

        if !(0.0..=1.0).contains(&self.connection_loss_probability) {
            return Err(Error::config(format!(
                "connection_loss_probability must be within [0, 1], got {}",
                self.connection_loss_probability
            )));
        }

        self.reconnect.validate()
    }

    pub fn connect_latency(&self) -> Duration {
        Duration::from_millis(self.connect_latency_ms)
    }

    pub fn disconnect_latency(&self) -> Duration {
        Duration::from_millis(self.disconnect_latency_ms)
    }

    pub fn processing_start_delay(&self) -> Duration {
        Duration::from_millis(self.processing_start_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl DelayWindow {
    /// Create a window; bounds are swapped if given in the wrong order.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// A window that always yields `ms`.
    pub fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// Map a uniform sample in `[0, 1)` onto the window.
    pub fn pick(&self, sample: f64) -> Duration {
        let span = self.max_ms.saturating_sub(self.min_ms);
        let offset = (sample.clamp(0.0, 1.0) * span as f64) as u64;
        Duration::from_millis(self.min_ms + offset.min(span))
    }
}

impl ReconnectPolicy {
    /// Reject policies that would never back off.
    pub fn validate(&self) -> Result<()> {
        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(Error::config(format!(
                "reconnect.growth_factor must be >= 1.0, got {}",
                self.growth_factor
            )));
        }
        Ok(())
    }

    /// Delay before the given 1-based attempt: `base * factor^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.base_delay_ms as f64 * self.growth_factor.powi(exponent);
        Duration::from_millis(ms.round() as u64)
    }
}

impl LogLevel {
    /// Lowercase name understood by tracing filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        let window = |(min, max): (u64, u64)| DelayWindow::new(min, max);
        Self {
            connect_latency_ms: DEFAULT_CONNECT_LATENCY_MS,
            disconnect_latency_ms: DEFAULT_DISCONNECT_LATENCY_MS,
            send_delay_ms: window(DEFAULT_SEND_DELAY_MS),
            receipt_delay_ms: window(DEFAULT_RECEIPT_DELAY_MS),
            processing_start_delay_ms: DEFAULT_PROCESSING_START_DELAY_MS,
            first_step_delay_ms: window(DEFAULT_FIRST_STEP_DELAY_MS),
            step_delay_ms: window(DEFAULT_STEP_DELAY_MS),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            connection_loss_probability: DEFAULT_CONNECTION_LOSS_PROBABILITY,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY_MS,
            growth_factor: DEFAULT_RECONNECT_GROWTH_FACTOR,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ChatdeckConfig::default().validate().is_ok());
    }

    #[test]
    fn backoff_grows_by_half_each_attempt() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u128> = (1..=5).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![2000, 3000, 4500, 6750, 10125]);
    }

    #[test]
    fn delay_window_stays_in_bounds() {
        let window = DelayWindow::new(100, 400);
        assert_eq!(window.pick(0.0), Duration::from_millis(100));
        assert_eq!(window.pick(0.5), Duration::from_millis(250));
        assert!(window.pick(0.999_999) < Duration::from_millis(400));
        assert_eq!(window.pick(7.0), Duration::from_millis(400));
        assert_eq!(DelayWindow::fixed(50).pick(0.3), Duration::from_millis(50));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: ChatdeckConfig = toml::from_str(
            r#"
            [realtime]
            heartbeat_interval_ms = 2500

            [realtime.reconnect]
            max_attempts = 2

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.realtime.heartbeat_interval_ms, 2500);
        assert_eq!(config.realtime.reconnect.max_attempts, 2);
        assert_eq!(config.realtime.reconnect.base_delay_ms, 2000);
        assert_eq!(config.realtime.connect_latency_ms, 500);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn save_then_load_preserves_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = ChatdeckConfig::default();
        config.realtime.send_delay_ms = DelayWindow::new(10, 20);
        config.realtime.connection_loss_probability = 0.25;
        config.save(&path).unwrap();

        let loaded = ChatdeckConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn save_into_a_file_path_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = ChatdeckConfig::default()
            .save(&blocker.join(CONFIG_FILE_NAME))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = RealtimeConfig::default();
        config.connection_loss_probability = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = RealtimeConfig::default();
        config.heartbeat_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RealtimeConfig::default();
        config.step_delay_ms = DelayWindow {
            min_ms: 900,
            max_ms: 100,
        };
        assert!(config.validate().is_err());

        let mut config = RealtimeConfig::default();
        config.reconnect.growth_factor = 0.5;
        assert!(config.validate().is_err());
    }
}
