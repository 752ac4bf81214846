//! Models of the simulated network: jitter, link drops, and reconnect outcomes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatdeck_core::{Error, RealtimeConfig, Result};

/// Source of every random decision the service makes.
///
/// Injecting this makes jitter and connection loss reproducible.
pub trait NetworkConditions: Send + 'static {
    /// Uniform sample in `[0, 1)` used to place a delay inside its window.
    fn sample(&mut self) -> f64;

    /// Asked on every heartbeat: did the link drop since the last one?
    fn link_dropped(&mut self) -> bool;

    /// Outcome of the handshake for the given reconnect attempt (1-based).
    fn redial(&mut self, attempt: u32) -> Result<()>;
}

/// Default model backed by `fastrand`; reconnects always succeed.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    rng: fastrand::Rng,
    loss_probability: f64,
}

impl SimulatedNetwork {
    pub fn new(loss_probability: f64) -> Self {
        Self {
            rng: fastrand::Rng::new(),
            loss_probability,
        }
    }

    /// Deterministic model for reproducible runs.
    pub fn seeded(seed: u64, loss_probability: f64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            loss_probability,
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.connection_loss_probability)
    }
}

impl NetworkConditions for SimulatedNetwork {
    fn sample(&mut self) -> f64 {
        self.rng.f64()
    }

    fn link_dropped(&mut self) -> bool {
        self.rng.f64() < self.loss_probability
    }

    fn redial(&mut self, _attempt: u32) -> Result<()> {
        Ok(())
    }
}

/// Hand-driven model. Clones share one script, so a test can keep a handle
/// while the service owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedNetwork {
    script: Arc<Mutex<Script>>,
}

#[derive(Debug, Default)]
struct Script {
    sample: f64,
    drops: VecDeque<bool>,
    failing_redials: Option<u32>,
    redials: u32,
    heartbeats: u32,
}

impl ScriptedNetwork {
    /// Every delay lands on the low edge of its window; nothing ever drops.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed jitter sample instead of `0.0`.
    pub fn with_sample(self, sample: f64) -> Self {
        self.script().sample = sample;
        self
    }

    /// Queue verdicts for upcoming heartbeats; an empty queue means "alive".
    pub fn queue_drops(&self, verdicts: impl IntoIterator<Item = bool>) {
        self.script().drops.extend(verdicts);
    }

    /// Refuse the next `count` reconnect handshakes.
    pub fn fail_redials(&self, count: u32) {
        self.script().failing_redials = Some(count);
    }

    /// Refuse every reconnect handshake from now on.
    pub fn refuse_all_redials(&self) {
        self.script().failing_redials = Some(u32::MAX);
    }

    pub fn redial_count(&self) -> u32 {
        self.script().redials
    }

    pub fn heartbeat_count(&self) -> u32 {
        self.script().heartbeats
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NetworkConditions for ScriptedNetwork {
    fn sample(&mut self) -> f64 {
        self.script().sample
    }

    fn link_dropped(&mut self) -> bool {
        let mut script = self.script();
        script.heartbeats += 1;
        script.drops.pop_front().unwrap_or(false)
    }

    fn redial(&mut self, attempt: u32) -> Result<()> {
        let mut script = self.script();
        script.redials += 1;
        match script.failing_redials {
            Some(0) | None => Ok(()),
            Some(u32::MAX) => Err(Error::redial(attempt, "link refused")),
            Some(remaining) => {
                script.failing_redials = Some(remaining - 1);
                Err(Error::redial(attempt, "link refused"))
            }
        }
    }
}
