mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatdeck_core::{DeliveryStatus, Error, EventKind, OutgoingMessage, RealtimeEvent};
use serde_json::json;
use tokio::time;

use common::{scripted_service, EventLog};

const PROCESSING_KINDS: [EventKind; 3] = [
    EventKind::ProcessingStarted,
    EventKind::ProcessingStepUpdated,
    EventKind::ProcessingCompleted,
];

#[tokio::test(start_paused = true)]
async fn send_requires_a_connection() {
    let (service, _network) = scripted_service();
    let log = EventLog::attach(&service);

    let result = service
        .send_message(OutgoingMessage::text("hello"), "chat")
        .await;
    assert!(matches!(result, Err(Error::NotConnected)));
    assert_eq!(log.count(EventKind::MessageSent), 0);

    let result = service.start_processing("msg_x", vec!["a".into()]).await;
    assert!(matches!(result, Err(Error::NotConnected)));
    assert!(log.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sent_message_is_echoed_then_acknowledged() {
    let (service, _network) = scripted_service();
    service.connect().await.unwrap();
    let log = EventLog::attach(&service);

    let sent = service
        .send_message(
            OutgoingMessage::text("hello").with_field("role", json!("user")),
            "chat",
        )
        .await
        .unwrap();

    assert!(sent.id.starts_with("msg_"));
    assert!(!sent.timestamp.is_empty());
    assert_eq!(sent.target_panel.as_str(), "chat");
    assert_eq!(sent.fields["content"], json!("hello"));
    assert_eq!(sent.fields["role"], json!("user"));

    assert_eq!(
        log.of_kind(EventKind::MessageSent),
        vec![RealtimeEvent::MessageSent(sent.clone())]
    );
    assert_eq!(log.count(EventKind::MessageReceived), 0);

    // Receipt window starts at 200ms.
    time::sleep(Duration::from_millis(250)).await;
    let receipts = log.of_kind(EventKind::MessageReceived);
    assert_eq!(receipts.len(), 1);
    match &receipts[0] {
        RealtimeEvent::MessageReceived(receipt) => {
            assert_eq!(receipt.original_message_id, sent.id);
            assert!(receipt.receipt_id.starts_with("receipt_"));
            assert_eq!(receipt.status, DeliveryStatus::Delivered);
        }
        other => panic!("expected receipt, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn client_supplied_id_and_timestamp_are_kept() {
    let (service, _network) = scripted_service();
    service.connect().await.unwrap();

    let sent = service
        .send_message(
            OutgoingMessage::text("hi")
                .with_id("client-7")
                .with_timestamp("2024-01-01T00:00:00.000Z"),
            "sidebar",
        )
        .await
        .unwrap();

    assert_eq!(sent.id, "client-7");
    assert_eq!(sent.timestamp, "2024-01-01T00:00:00.000Z");
    assert_eq!(sent.target_panel.as_str(), "sidebar");
}

#[tokio::test(start_paused = true)]
async fn processing_reports_steps_in_order() {
    let (service, _network) = scripted_service();
    service.connect().await.unwrap();
    let log = EventLog::attach(&service);

    let started = service
        .start_processing("msg_1", vec!["a".into(), "b".into()])
        .await
        .unwrap();
    assert_eq!(started.message_id, "msg_1");
    assert_eq!(started.current_step, 0);
    assert_eq!(started.steps.len(), 2);

    // 200ms to the first step, then 500ms per step and for completion.
    time::sleep(Duration::from_millis(1_300)).await;

    let events: Vec<RealtimeEvent> = log
        .events()
        .into_iter()
        .filter(|event| PROCESSING_KINDS.contains(&event.kind()))
        .collect();
    assert_eq!(events.len(), 4);

    assert_eq!(events[0], RealtimeEvent::ProcessingStarted(started));
    let steps: Vec<(usize, String)> = events[1..3]
        .iter()
        .map(|event| match event {
            RealtimeEvent::ProcessingStepUpdated(update) => {
                assert_eq!(update.message_id, "msg_1");
                (update.current_step, update.step_name.clone())
            }
            other => panic!("expected step update, got {:?}", other),
        })
        .collect();
    assert_eq!(steps, vec![(0, "a".to_string()), (1, "b".to_string())]);

    match &events[3] {
        RealtimeEvent::ProcessingCompleted(done) => {
            assert_eq!(done.message_id, "msg_1");
            assert_eq!(done.steps.len(), 2);
        }
        other => panic!("expected completion, got {:?}", other),
    }

    let wire = serde_json::to_value(&events[1]).unwrap();
    assert_eq!(wire["type"], "processing_step_updated");
    assert_eq!(wire["data"]["stepName"], "a");
    assert_eq!(wire["data"]["stepStatus"], "completed");
}

#[tokio::test(start_paused = true)]
async fn processing_without_steps_only_starts() {
    let (service, _network) = scripted_service();
    service.connect().await.unwrap();
    let log = EventLog::attach(&service);

    service.start_processing("msg_2", Vec::new()).await.unwrap();
    time::sleep(Duration::from_secs(5)).await;

    assert_eq!(log.kinds(), vec![EventKind::ProcessingStarted]);
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_listener_stops_receiving() {
    let (service, _network) = scripted_service();
    service.connect().await.unwrap();

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let first_in = Arc::clone(&first);
    let second_in = Arc::clone(&second);

    let subscription = service.subscribe(EventKind::MessageSent, move |_| {
        first_in.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    service.subscribe(EventKind::MessageSent, move |_| {
        second_in.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    service
        .send_message(OutgoingMessage::text("one"), "chat")
        .await
        .unwrap();
    assert!(subscription.unsubscribe());
    service
        .send_message(OutgoingMessage::text("two"), "chat")
        .await
        .unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 2);
    assert_eq!(service.bus().listener_count(EventKind::MessageSent), 1);
}

#[tokio::test(start_paused = true)]
async fn faulty_listeners_do_not_affect_the_sender() {
    let (service, _network) = scripted_service();
    service.connect().await.unwrap();

    service.subscribe(EventKind::MessageSent, |_| {
        Err(anyhow::anyhow!("panel not mounted"))
    });
    service.subscribe(EventKind::MessageSent, |_| panic!("render crashed"));
    let log = EventLog::attach(&service);

    let sent = service
        .send_message(OutgoingMessage::text("still works"), "chat")
        .await
        .unwrap();
    assert_eq!(
        log.of_kind(EventKind::MessageSent),
        vec![RealtimeEvent::MessageSent(sent)]
    );
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_pending_receipts_and_steps() {
    let (service, network) = scripted_service();
    service.connect().await.unwrap();

    service
        .start_processing("msg_3", vec!["a".into(), "b".into()])
        .await
        .unwrap();
    service
        .send_message(OutgoingMessage::text("pending"), "chat")
        .await
        .unwrap();

    service.dispose();
    assert_eq!(service.bus().listener_count(EventKind::MessageReceived), 0);

    // Listeners added after dispose would still hear anything left running.
    let log = EventLog::attach(&service);
    time::sleep(Duration::from_secs(30)).await;

    assert!(log.events().is_empty());
    assert_eq!(network.heartbeat_count(), 0);
}
