#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chatdeck_core::{ConnectionStateChange, EventKind, RealtimeConfig, RealtimeEvent};
use chatdeck_realtime::{RealtimeService, ScriptedNetwork};

/// Records every event the service publishes, in delivery order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<RealtimeEvent>>>,
}

impl EventLog {
    pub fn attach(service: &RealtimeService) -> Self {
        let log = Self::default();
        for kind in EventKind::ALL {
            let events = Arc::clone(&log.events);
            service.subscribe(kind, move |event| {
                events.lock().unwrap().push(event.clone());
                Ok(())
            });
        }
        log
    }

    pub fn events(&self) -> Vec<RealtimeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(RealtimeEvent::kind).collect()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<RealtimeEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.kind() == kind)
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).len()
    }

    pub fn state_changes(&self) -> Vec<ConnectionStateChange> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RealtimeEvent::ConnectionStateChanged(change) => Some(change),
                _ => None,
            })
            .collect()
    }
}

/// Service on default timings whose jitter always lands on the low edge.
pub fn scripted_service() -> (RealtimeService, ScriptedNetwork) {
    let network = ScriptedNetwork::new();
    let service = RealtimeService::with_network(RealtimeConfig::default(), network.clone())
        .expect("default config is valid");
    (service, network)
}
