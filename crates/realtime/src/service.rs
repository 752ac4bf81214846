//! The realtime service: a simulated persistent connection to the chat backend.
//!
//! Every operation that "talks to the server" is an `async fn` whose latency
//! is a `tokio::time::sleep`. Background behavior (heartbeat, reconnect with
//! backoff, delivery receipts, processing steps) runs in tasks owned by the
//! service; those tasks hold only a weak reference and re-check the state
//! when they wake, since it may have changed while they slept.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chatdeck_core::constants::{CONNECTION_ID_PREFIX, MESSAGE_ID_PREFIX, RECEIPT_ID_PREFIX};
use chatdeck_core::{
    now_iso8601, ConnectionSnapshot, ConnectionStateChange, DelayWindow, DeliveryStatus, Error,
    ErrorCode, ErrorPayload, EventKind, OutgoingMessage, ProcessingSnapshot, ProcessingStep,
    RealtimeConfig, RealtimeEvent, Receipt, Result, SentMessage, TargetPanel,
};
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Subscription};
use crate::connection::{Connection, ReconnectStep};
use crate::ids::IdGenerator;
use crate::network::{NetworkConditions, SimulatedNetwork};
use crate::session::{Advance, ProcessingSession};

const MAX_RECONNECT_MESSAGE: &str = "Failed to reconnect after maximum attempts";

/// Handle to a realtime service. Clones share the same connection and bus.
#[derive(Clone)]
pub struct RealtimeService {
    inner: Arc<Inner>,
}

struct Inner {
    config: RealtimeConfig,
    bus: EventBus,
    ids: IdGenerator,
    network: Mutex<Box<dyn NetworkConditions>>,
    state: Mutex<ServiceState>,
}

struct ServiceState {
    connection: Connection,
    tasks: JoinSet<()>,
    disposed: bool,
}

impl RealtimeService {
    /// Create a service driven by the default random network model.
    pub fn new(config: RealtimeConfig) -> Result<Self> {
        let network = SimulatedNetwork::from_config(&config);
        Self::with_network(config, network)
    }

    /// Create a service with an injected network model.
    pub fn with_network(
        config: RealtimeConfig,
        network: impl NetworkConditions,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                bus: EventBus::new(),
                ids: IdGenerator::default(),
                network: Mutex::new(Box::new(network)),
                state: Mutex::new(ServiceState {
                    connection: Connection::default(),
                    tasks: JoinSet::new(),
                    disposed: false,
                }),
            }),
        })
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Register `callback` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(kind, callback)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state().connection.is_connected()
    }

    pub fn connection_id(&self) -> Option<String> {
        self.inner.state().connection.id().map(str::to_string)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state().connection.reconnect_attempts()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.inner.state().connection.snapshot()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state().disposed
    }

    /// Open the connection, or return the current id if already connected.
    ///
    /// Never fails for network reasons; only a disposed service rejects.
    pub async fn connect(&self) -> Result<String> {
        {
            let state = self.inner.state();
            if state.disposed {
                return Err(Error::Disposed);
            }
            if let Some(id) = state.connection.id() {
                return Ok(id.to_string());
            }
        }

        time::sleep(self.inner.config.connect_latency()).await;
        self.inner.establish()
    }

    /// Close the connection. Resolves immediately if there is none.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        time::sleep(self.inner.config.disconnect_latency()).await;

        // The link may have dropped while we waited.
        let Some(previous) = self.inner.state().connection.drop_link() else {
            return Ok(());
        };

        self.inner
            .emit(RealtimeEvent::ConnectionStateChanged(ConnectionStateChange {
                connected: false,
                connection_id: Some(previous.clone()),
            }));
        info!(connection_id = %previous, "disconnected");
        Ok(())
    }

    /// Send `message` to `target_panel`.
    ///
    /// Rejects with [`Error::NotConnected`] before any delay when offline.
    /// The delivery receipt arrives later as a `message_received` event.
    pub async fn send_message(
        &self,
        message: OutgoingMessage,
        target_panel: impl Into<TargetPanel>,
    ) -> Result<SentMessage> {
        self.inner.ensure_connected()?;
        let target_panel = target_panel.into();

        let delay = self.inner.jitter(self.inner.config.send_delay_ms);
        time::sleep(delay).await;
        self.inner.ensure_open()?;

        let sent = SentMessage::from_draft(message, target_panel, || {
            self.inner.ids.next(MESSAGE_ID_PREFIX)
        });

        self.inner.emit(RealtimeEvent::MessageSent(sent.clone()));
        debug!(message_id = %sent.id, panel = %sent.target_panel, "message sent");

        self.inner.schedule_receipt(sent.id.clone());
        Ok(sent)
    }

    /// Start simulated processing of `message_id` through `steps`.
    ///
    /// Resolves with the started snapshot; step and completion events follow.
    /// An empty step list produces no further events.
    pub async fn start_processing(
        &self,
        message_id: impl Into<String>,
        steps: Vec<ProcessingStep>,
    ) -> Result<ProcessingSnapshot> {
        self.inner.ensure_connected()?;
        let message_id = message_id.into();

        time::sleep(self.inner.config.processing_start_delay()).await;
        self.inner.ensure_open()?;

        let session = ProcessingSession::new(message_id, steps);
        let snapshot = session.snapshot();

        self.inner
            .emit(RealtimeEvent::ProcessingStarted(snapshot.clone()));
        info!(
            message_id = %snapshot.message_id,
            steps = snapshot.steps.len(),
            "processing started"
        );

        if session.has_steps() {
            self.inner.schedule_steps(session);
        }
        Ok(snapshot)
    }

    /// Drop the live connection as if a heartbeat had detected a loss, then
    /// start reconnecting. Returns false if there was no live connection.
    ///
    /// Must be called from within the Tokio runtime that drives the service.
    pub fn force_connection_loss(&self) -> bool {
        self.inner.handle_connection_loss()
    }

    /// Cancel every pending timer, forget the connection without emitting,
    /// and drop all subscriptions. Later calls fail with [`Error::Disposed`].
    pub fn dispose(&self) {
        let tasks = {
            let mut state = self.inner.state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.connection.reset();
            std::mem::replace(&mut state.tasks, JoinSet::new())
        };

        // Dropping the set aborts everything still pending.
        drop(tasks);
        self.inner.bus.clear();
        info!("realtime service disposed");
    }
}

impl fmt::Debug for RealtimeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeService")
            .field("connection", &self.snapshot())
            .field("disposed", &self.is_disposed())
            .field("bus", &self.inner.bus)
            .finish()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn network(&self) -> MutexGuard<'_, Box<dyn NetworkConditions>> {
        self.network.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn jitter(&self, window: DelayWindow) -> Duration {
        window.pick(self.network().sample())
    }

    fn emit(&self, event: RealtimeEvent) {
        self.bus.emit(&event);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state().disposed {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        let state = self.state();
        if state.disposed {
            return Err(Error::Disposed);
        }
        if !state.connection.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn is_current(&self, connection_id: &str) -> bool {
        let state = self.state();
        !state.disposed && state.connection.id() == Some(connection_id)
    }

    /// Finish a connect: new id, reset attempts, heartbeat armed.
    fn establish(self: &Arc<Self>) -> Result<String> {
        let connection_id = {
            let mut state = self.state();
            if state.disposed {
                return Err(Error::Disposed);
            }
            // Another connect finished while this one was in flight.
            if let Some(id) = state.connection.id() {
                return Ok(id.to_string());
            }

            let id = self.ids.next(CONNECTION_ID_PREFIX);
            state.connection.establish(id.clone());
            let heartbeat = spawn_task(
                &mut state,
                heartbeat_loop(
                    Arc::downgrade(self),
                    id.clone(),
                    self.config.heartbeat_interval(),
                ),
            );
            state.connection.arm_heartbeat(heartbeat);
            id
        };

        self.emit(RealtimeEvent::ConnectionStateChanged(
            ConnectionStateChange {
                connected: true,
                connection_id: Some(connection_id.clone()),
            },
        ));
        info!(connection_id = %connection_id, "connected");
        Ok(connection_id)
    }

    fn handle_connection_loss(self: &Arc<Self>) -> bool {
        let lost_id = {
            let mut state = self.state();
            if state.disposed || !state.connection.is_connected() {
                return false;
            }
            state.connection.drop_link()
        };

        self.emit(RealtimeEvent::ConnectionStateChanged(
            ConnectionStateChange {
                connected: false,
                connection_id: lost_id,
            },
        ));
        warn!("connection lost, attempting to reconnect");

        // Listeners ran in between; only start the loop if still offline.
        let mut state = self.state();
        if !state.disposed && !state.connection.is_connected() {
            let reconnect = spawn_task(&mut state, reconnect_loop(Arc::downgrade(self)));
            state.connection.arm_reconnect(reconnect);
        }
        true
    }

    fn give_up(&self, attempts: u32) {
        warn!(attempts, "max reconnect attempts reached, giving up");
        self.emit(RealtimeEvent::Error(ErrorPayload {
            code: ErrorCode::MaxReconnectAttempts,
            message: MAX_RECONNECT_MESSAGE.to_string(),
        }));
    }

    fn schedule_receipt(self: &Arc<Self>, message_id: String) {
        let delay = self.jitter(self.config.receipt_delay_ms);
        let mut state = self.state();
        if state.disposed {
            return;
        }
        spawn_task(
            &mut state,
            receipt_task(Arc::downgrade(self), message_id, delay),
        );
    }

    fn schedule_steps(self: &Arc<Self>, session: ProcessingSession) {
        let first_delay = self.jitter(self.config.first_step_delay_ms);
        let mut state = self.state();
        if state.disposed {
            return;
        }
        spawn_task(
            &mut state,
            processing_loop(Arc::downgrade(self), session, first_delay),
        );
    }
}

fn spawn_task<F>(state: &mut ServiceState, task: F) -> AbortHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    // Reap finished tasks so the set only tracks pending timers.
    while state.tasks.try_join_next().is_some() {}
    state.tasks.spawn(task)
}

async fn heartbeat_loop(service: Weak<Inner>, connection_id: String, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = service.upgrade() else {
            return;
        };
        if !inner.is_current(&connection_id) {
            debug!(connection_id = %connection_id, "heartbeat stopped for stale connection");
            return;
        }

        let dropped = inner.network().link_dropped();
        debug!(connection_id = %connection_id, dropped, "heartbeat");
        if dropped {
            inner.handle_connection_loss();
            return;
        }
    }
}

async fn reconnect_loop(service: Weak<Inner>) {
    loop {
        let (step, max_attempts, connect_latency) = {
            let Some(inner) = service.upgrade() else {
                return;
            };
            let mut state = inner.state();
            if state.disposed || state.connection.is_connected() {
                return;
            }
            let step = state.connection.next_reconnect(&inner.config.reconnect);
            (
                step,
                inner.config.reconnect.max_attempts,
                inner.config.connect_latency(),
            )
        };

        let attempt = match step {
            ReconnectStep::Exhausted { attempts } => {
                if let Some(inner) = service.upgrade() {
                    inner.give_up(attempts);
                }
                return;
            }
            ReconnectStep::Retry { attempt, delay } => {
                info!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting"
                );
                time::sleep(delay).await;
                attempt
            }
        };

        // Same path as connect(): bail if someone reconnected meanwhile.
        let still_offline = match service.upgrade() {
            Some(inner) => {
                let state = inner.state();
                !state.disposed && !state.connection.is_connected()
            }
            None => false,
        };
        if !still_offline {
            return;
        }
        time::sleep(connect_latency).await;

        let Some(inner) = service.upgrade() else {
            return;
        };
        let verdict = inner.network().redial(attempt);
        match verdict {
            Ok(()) => {
                if let Err(err) = inner.establish() {
                    debug!(error = %err, "reconnect abandoned");
                }
                return;
            }
            Err(err) => warn!(error = %err, "reconnect attempt failed"),
        }
    }
}

async fn receipt_task(service: Weak<Inner>, message_id: String, delay: Duration) {
    time::sleep(delay).await;
    let Some(inner) = service.upgrade() else {
        return;
    };

    let receipt = Receipt {
        original_message_id: message_id,
        receipt_id: inner.ids.next(RECEIPT_ID_PREFIX),
        timestamp: now_iso8601(),
        status: DeliveryStatus::Delivered,
    };
    debug!(message_id = %receipt.original_message_id, "server acknowledged message");
    inner.emit(RealtimeEvent::MessageReceived(receipt));
}

async fn processing_loop(service: Weak<Inner>, mut session: ProcessingSession, first_delay: Duration) {
    let mut delay = first_delay;
    loop {
        time::sleep(delay).await;
        let Some(inner) = service.upgrade() else {
            debug!(message_id = session.message_id(), "processing abandoned");
            return;
        };

        match session.advance() {
            Some(Advance::Step(update)) => {
                debug!(
                    message_id = %update.message_id,
                    step = update.current_step,
                    name = %update.step_name,
                    "processing step completed"
                );
                inner.emit(RealtimeEvent::ProcessingStepUpdated(update));
                delay = inner.jitter(inner.config.step_delay_ms);
            }
            Some(Advance::Completed(done)) => {
                info!(message_id = %done.message_id, "processing completed");
                inner.emit(RealtimeEvent::ProcessingCompleted(done));
                return;
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ScriptedNetwork;

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = RealtimeConfig::default();
        config.connection_loss_probability = -0.1;
        assert!(matches!(
            RealtimeService::new(config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn fresh_service_is_disconnected() {
        let service =
            RealtimeService::with_network(RealtimeConfig::default(), ScriptedNetwork::new())
                .unwrap();
        assert_eq!(service.snapshot(), ConnectionSnapshot::default());
        assert!(format!("{:?}", service).contains("RealtimeService"));
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_is_idempotent_and_rejects_later_calls() {
        let service =
            RealtimeService::with_network(RealtimeConfig::default(), ScriptedNetwork::new())
                .unwrap();
        service.connect().await.unwrap();

        service.dispose();
        service.dispose();

        assert!(service.is_disposed());
        assert!(!service.is_connected());
        assert!(matches!(service.connect().await, Err(Error::Disposed)));
        assert!(matches!(
            service.send_message(OutgoingMessage::text("late"), "chat").await,
            Err(Error::Disposed)
        ));
        assert!(service.disconnect().await.is_ok());
        assert!(!service.force_connection_loss());
    }
}
