//! End-to-end tests: readings on the bus drive the player manager
//!
//! The AGD processor and the spawned player manager share one bus, as they
//! do in the binary; layer processes are mocked.

mod helpers;

use helpers::{levels, media, wait_for_state, MockSupervisor};
use std::time::Duration;
use tokio::sync::broadcast;
use vela_common::events::{EventBus, PlayerState, VelaEvent};
use vela_player::agd::{AgdProcessor, SharedThresholds, ThresholdTable};
use vela_player::playback::PlayerManager;

fn reading(value: f64) -> VelaEvent {
    VelaEvent::Reading {
        source: "network".to_string(),
        value,
    }
}

async fn next_matching<F>(rx: &mut broadcast::Receiver<VelaEvent>, mut wanted: F) -> VelaEvent
where
    F: FnMut(&VelaEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("bus closed");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_rising_readings_escalate_playback() {
    let bus = EventBus::new(256);
    let thresholds = SharedThresholds::new(ThresholdTable::new(vec![5.0, 10.0, 20.0]));
    let processor = AgdProcessor::new("network", 10, thresholds, bus.clone()).unwrap();
    tokio::spawn(processor.run(bus.subscribe()));

    let supervisor = MockSupervisor::new();
    let mut manager = PlayerManager::new(supervisor.clone(), media(3), levels(3), bus.clone());
    manager.start().await.unwrap();
    let player = manager.spawn();
    let mut state = player.subscribe_state();

    // 0 -> 6 crosses level 1, -> 12 crosses level 2
    for value in [0.0, 6.0, 12.0] {
        bus.emit_lossy(reading(value));
    }
    wait_for_state(&mut state, |s| *s == PlayerState::Playing { level: 2 }).await;

    // A drop resets the aggregate; the manager does not downgrade
    bus.emit_lossy(reading(1.0));
    bus.emit_lossy(reading(30.0));
    wait_for_state(&mut state, |s| *s == PlayerState::Playing { level: 3 }).await;

    assert_eq!(
        supervisor.lifecycle(),
        vec![
            ("spawn", 0),
            ("spawn", 1),
            ("spawn", 2),
            ("stop", 1),
            ("spawn", 3),
            ("stop", 2),
        ]
    );

    player.stop().await;
}

#[tokio::test]
async fn test_every_reading_publishes_output() {
    let bus = EventBus::new(256);
    let mut rx = bus.subscribe();
    let thresholds = SharedThresholds::new(ThresholdTable::new(vec![5.0]));
    let processor = AgdProcessor::new("network", 4, thresholds, bus.clone()).unwrap();
    tokio::spawn(processor.run(bus.subscribe()));

    for value in [1.0, 3.0, 2.0, 5.0] {
        bus.emit_lossy(reading(value));
    }

    let mut agds = Vec::new();
    while agds.len() < 4 {
        if let VelaEvent::AgdOutput { agd, .. } =
            next_matching(&mut rx, |e| matches!(e, VelaEvent::AgdOutput { .. })).await
        {
            agds.push(agd);
        }
    }
    assert_eq!(agds, vec![0.0, 2.0, 0.0, 3.0]);
}

#[tokio::test]
async fn test_threshold_requests_over_bus() {
    let bus = EventBus::new(256);
    let mut rx = bus.subscribe();
    let thresholds = SharedThresholds::new(ThresholdTable::new(vec![5.0, 10.0]));
    let processor = AgdProcessor::new("network", 4, thresholds.clone(), bus.clone()).unwrap();
    tokio::spawn(processor.run(bus.subscribe()));

    bus.emit_lossy(VelaEvent::SetThreshold { level: 9, value: 1.0 });
    bus.emit_lossy(VelaEvent::SetThreshold { level: 2, value: 7.5 });

    let echoed = next_matching(&mut rx, |e| matches!(e, VelaEvent::AgdThreshold { .. })).await;
    assert_eq!(echoed, VelaEvent::AgdThreshold { level: 2, value: 7.5 });
    assert_eq!(thresholds.get_all(), vec![(1, 5.0), (2, 7.5)]);

    bus.emit_lossy(VelaEvent::RequestThresholds);
    let first = next_matching(&mut rx, |e| matches!(e, VelaEvent::AgdThreshold { .. })).await;
    let second = next_matching(&mut rx, |e| matches!(e, VelaEvent::AgdThreshold { .. })).await;
    assert_eq!(first, VelaEvent::AgdThreshold { level: 1, value: 5.0 });
    assert_eq!(second, VelaEvent::AgdThreshold { level: 2, value: 7.5 });
}
