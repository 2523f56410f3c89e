//! Tests for the Bridge context

use super::*;
use crate::entity::RemoteEntity;
use crate::hass::mock::MockHassClient;
use crate::hass::ServiceCall;
use crate::surface::DisplayUpdate;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;

fn make_client(entities: Vec<RemoteEntity>) -> Arc<MockHassClient> {
    Arc::new(MockHassClient::with_entities(entities))
}

fn kitchen_and_fan() -> Vec<RemoteEntity> {
    vec![
        RemoteEntity::new("light.kitchen", "on").with_name("Kitchen"),
        RemoteEntity::new("switch.fan", "off").with_name("Fan"),
        RemoteEntity::new("sensor.outside", "12.5"),
    ]
}

#[tokio::test]
async fn test_end_to_end_discovery_and_poll() {
    let client = make_client(kitchen_and_fan());
    let bridge = Bridge::start(client.clone(), BridgeOptions::default(), None)
        .await
        .unwrap();

    let registry = bridge.registry();
    assert_eq!(registry.len(), 2);
    let fader = registry.lookup_fader("light.kitchen").unwrap();
    let button = registry.lookup_button("switch.fan").unwrap();
    assert_eq!(fader.display_name(), "Kitchen");
    assert!(!fader.muted());
    assert!(!button.active());
    assert!(registry.lookup("sensor.outside").is_none());

    // Next poll only reports the kitchen light, now off
    button.set_active(true);
    client.remove("switch.fan");
    client.remove("sensor.outside");
    client.set_state("light.kitchen", "off");

    let outcome = bridge.poll_now().await;

    assert!(matches!(outcome, Some(TickOutcome::Reconciled(r)) if r.matched == 1));
    assert!(fader.muted());
    assert!(button.active(), "entities missing from the snapshot are untouched");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_poll_now_reconciles_registry() {
    let client = make_client(kitchen_and_fan());
    let bridge = Bridge::start(client.clone(), BridgeOptions::default(), None)
        .await
        .unwrap();

    client.set_state("light.kitchen", "off");
    let outcome = bridge.poll_now().await;

    assert!(matches!(outcome, Some(TickOutcome::Reconciled(r)) if r.changed == 1));
    assert!(bridge.registry().lookup_fader("light.kitchen").unwrap().muted());
    assert!(!bridge.registry().lookup_button("switch.fan").unwrap().active());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_discovery_failure_is_reported() {
    let client = make_client(kitchen_and_fan());
    client.fail_snapshot.store(true, Ordering::SeqCst);

    let result = Bridge::start(client, BridgeOptions::default(), None).await;
    assert!(matches!(result, Err(BridgeError::Discovery(_))));
}

#[tokio::test]
async fn test_display_receives_initial_sync() {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    let display: DisplayCallback = Arc::new(move |update: &DisplayUpdate| {
        sink.lock().push(update.clone());
    });

    let client = make_client(vec![
        RemoteEntity::new("light.off", "off"),
        RemoteEntity::new("light.on", "on"),
        RemoteEntity::new("switch.on", "on"),
    ]);
    let bridge = Bridge::start(client, BridgeOptions::default(), Some(display))
        .await
        .unwrap();

    // Only controls whose default state differs from the hub are reported
    let updates = updates.lock().clone();
    assert_eq!(updates.len(), 2);
    assert!(updates.contains(&DisplayUpdate::Muted {
        id: "light.off".to_string(),
        muted: true
    }));
    assert!(updates.contains(&DisplayUpdate::Active {
        id: "switch.on".to_string(),
        active: true
    }));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_handle_event_routes_gestures() {
    let client = make_client(kitchen_and_fan());
    client.apply_calls.store(true, Ordering::SeqCst);
    let bridge = Bridge::start(client.clone(), BridgeOptions::default(), None)
        .await
        .unwrap();

    bridge
        .handle_event(ControlEvent::MutePressed {
            id: "light.kitchen".to_string(),
        })
        .await;
    bridge
        .handle_event(ControlEvent::Pressed {
            id: "switch.fan".to_string(),
        })
        .await;

    assert!(bridge.registry().lookup_fader("light.kitchen").unwrap().muted());
    assert!(bridge.registry().lookup_button("switch.fan").unwrap().active());
    assert_eq!(client.state_of("light.kitchen").as_deref(), Some("off"));
    assert_eq!(client.state_of("switch.fan").as_deref(), Some("on"));

    // A poll after the gestures agrees with the optimistic state
    let outcome = bridge.poll_now().await;
    assert!(matches!(outcome, Some(TickOutcome::Reconciled(r)) if r.changed == 0));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_mismatched_and_unknown_gestures_ignored() {
    let client = make_client(kitchen_and_fan());
    let bridge = Bridge::start(client.clone(), BridgeOptions::default(), None)
        .await
        .unwrap();

    bridge
        .handle_event(ControlEvent::Pressed {
            id: "light.kitchen".to_string(),
        })
        .await;
    bridge
        .handle_event(ControlEvent::MutePressed {
            id: "light.garage".to_string(),
        })
        .await;

    assert!(client.calls().is_empty());
    assert!(!bridge.gate().is_held());

    bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_event_sender_dispatches_volume_with_throttle() {
    let client = make_client(kitchen_and_fan());
    let options = BridgeOptions {
        poll_interval_secs: 1,
        ..BridgeOptions::default()
    };
    let bridge = Bridge::start(client.clone(), options, None).await.unwrap();
    let events = bridge.event_sender();

    for level in [0.1, 0.2, 0.33] {
        events
            .send(ControlEvent::VolumeChanged {
                id: "light.kitchen".to_string(),
                level,
            })
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(
        client.calls(),
        vec![ServiceCall::turn_on_brightness(
            "light.kitchen",
            33,
            DEFAULT_TRANSITION_SECS
        )]
    );
    // Tick at 1s runs once the write released the gate
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(bridge.poll().stats().ticks(), 1);

    bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_tick_skipped_while_gesture_in_flight() {
    let client = make_client(kitchen_and_fan());
    let options = BridgeOptions {
        poll_interval_secs: 1,
        fader_throttle: Duration::from_millis(1500),
        ..BridgeOptions::default()
    };
    let bridge = Bridge::start(client.clone(), options, None).await.unwrap();

    // Hub says off, but a fader move is pending for 1.5s
    client.set_state("light.kitchen", "off");
    bridge
        .handle_event(ControlEvent::VolumeChanged {
            id: "light.kitchen".to_string(),
            level: 0.8,
        })
        .await;

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let stats = bridge.poll().stats();
    assert_eq!(stats.ticks(), 1);
    assert_eq!(stats.suspended.load(Ordering::Relaxed), 1);
    assert!(!bridge.registry().lookup_fader("light.kitchen").unwrap().muted());
    assert_eq!(client.snapshot_fetches.load(Ordering::SeqCst), 1, "only discovery fetched");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_options_from_config() {
    let yaml = r#"
hass:
  host: "hass.local:8123"
  token: "abc"
  poll_interval_secs: 7
bridge:
  volume_throttle_ms: 500
  transition_secs: 1.0
"#;
    let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
    let options = BridgeOptions::from_config(&config);

    assert_eq!(options.poll_interval_secs, 7);
    assert_eq!(options.fader_throttle, Duration::from_millis(500));
    assert_eq!(options.transition_secs, 1.0);
}

#[tokio::test]
async fn test_discovery_seeds_fader_level_from_brightness() {
    let client = make_client(vec![
        RemoteEntity::new("light.kitchen", "on").with_brightness(128),
        RemoteEntity::new("light.hall", "off"),
    ]);
    let bridge = Bridge::start(client, BridgeOptions::default(), None).await.unwrap();

    let kitchen = bridge.registry().lookup_fader("light.kitchen").unwrap();
    assert!((kitchen.volume() - 0.50).abs() < 1e-6);
    assert!(!kitchen.muted());

    let hall = bridge.registry().lookup_fader("light.hall").unwrap();
    assert_eq!(hall.volume(), 0.0);
    assert!(hall.muted());

    bridge.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_volume_burst_writes_last_level_on_worker_threads() {
    let client = make_client(kitchen_and_fan());
    let options = BridgeOptions {
        fader_throttle: Duration::from_millis(30),
        ..BridgeOptions::default()
    };
    let bridge = Bridge::start(client.clone(), options, None).await.unwrap();
    let events = bridge.event_sender();
    let fader = bridge.registry().lookup_fader("light.kitchen").unwrap();

    for round in 0..10 {
        for step in 1..=40u8 {
            events
                .send(ControlEvent::VolumeChanged {
                    id: "light.kitchen".to_string(),
                    level: f32::from(step) / 100.0,
                })
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let last = client.calls().last().cloned().unwrap();
        assert_eq!(last.brightness_pct, Some(40), "round {}", round);
        assert!((fader.volume() - 0.40).abs() < 1e-6, "round {}", round);
        assert!(!bridge.gate().is_held());
    }

    bridge.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gesture_during_poll_fetch_keeps_optimistic_state() {
    let client = make_client(kitchen_and_fan());
    let bridge = Bridge::start(client.clone(), BridgeOptions::default(), None)
        .await
        .unwrap();
    client.set_snapshot_delay(Duration::from_millis(150));

    let poller = bridge.poll().clone();
    let pending = tokio::spawn(async move { poller.poll_now().await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    bridge
        .handle_event(ControlEvent::MutePressed {
            id: "light.kitchen".to_string(),
        })
        .await;

    // Hub still reports the light on; the snapshot must not undo the mute
    assert_eq!(pending.await.unwrap(), Some(TickOutcome::Stale));
    let fader = bridge.registry().lookup_fader("light.kitchen").unwrap();
    assert!(fader.muted());
    assert_eq!(client.calls(), vec![ServiceCall::toggle("light.kitchen")]);
    assert!(!bridge.gate().is_held());

    bridge.shutdown().await;
}
