mod support;

use dolby_cp750::{Cp750Device, Cp750Error, DeviceSnapshot, InputSource};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use support::MockCp750;
use tokio::time::timeout;

const QUERY_BATTERY: [&str; 7] = [
    "cp750.sys.fader ?",
    "cp750.sys.input_mode ?",
    "cp750.sys.mute ?",
    "cp750.state.dig_1_valid ?",
    "cp750.state.dig_2_valid ?",
    "cp750.state.dig_3_valid ?",
    "cp750.state.dig_4_valid ?",
];

#[tokio::test]
async fn poll_cycle_populates_full_snapshot() {
    let mock = MockCp750::spawn().await;
    {
        let mut state = mock.state();
        state.fader = -12.5;
        state.input = "dig_2".to_string();
        state.mute = true;
        state.dig_valid = [true, false, true, false];
    }

    let mut device = Cp750Device::new(mock.config());
    device.refresh().await;

    assert_eq!(
        device.snapshot(),
        DeviceSnapshot {
            fader: Some(-12.5),
            input: Some(InputSource::Digital2),
            mute: Some(true),
            digital_input_valid: [Some(true), Some(false), Some(true), Some(false)],
        }
    );
    device.shutdown().await;
}

#[tokio::test]
async fn timer_publishes_without_manual_refresh() {
    let mock = MockCp750::spawn().await;
    mock.state().fader = -4.0;

    let mut device =
        Cp750Device::new(mock.config().with_poll_interval(Duration::from_millis(50)));
    let mut updates = device.subscribe();

    let snapshot = timeout(Duration::from_secs(2), async {
        updates.wait_for(|s| !s.is_offline()).await.unwrap().clone()
    })
    .await
    .expect("timer never published a snapshot");

    assert_eq!(snapshot.fader, Some(-4.0));
    device.shutdown().await;
}

#[tokio::test]
async fn closed_gate_publishes_offline_snapshot_without_transport_calls() {
    let mock = MockCp750::spawn().await;
    let config = mock
        .config()
        .with_power_switch("booth_power")
        .with_poll_interval(Duration::from_millis(50));
    let mut device = Cp750Device::with_power_lookup(config, Arc::new(|_| Some(false)));

    // Let several ticks elapse.
    tokio::time::sleep(Duration::from_millis(300)).await;
    device.refresh().await;

    assert_eq!(device.snapshot(), DeviceSnapshot::offline());
    assert!(mock.commands().is_empty());
    assert!(!device.available());
    device.shutdown().await;
}

#[tokio::test]
async fn malformed_reply_leaves_only_that_field_absent() {
    let mock = MockCp750::spawn().await;
    {
        let mut state = mock.state();
        state.fader = -6.0;
        state.input = "analog".to_string();
        state.dig_valid = [true; 4];
        state.drop_mute_value = true;
    }

    let mut device = Cp750Device::new(mock.config());
    device.refresh().await;

    let snapshot = device.snapshot();
    assert_eq!(snapshot.mute, None);
    assert_eq!(snapshot.fader, Some(-6.0));
    assert_eq!(snapshot.input, Some(InputSource::Analog));
    assert_eq!(snapshot.digital_input_valid, [Some(true); 4]);
    device.shutdown().await;
}

#[tokio::test]
async fn failed_cycle_retains_previous_snapshot_and_reports_fault() {
    let mock = MockCp750::spawn().await;
    mock.state().fader = -20.0;

    let mut device = Cp750Device::new(mock.config());
    device.refresh().await;
    let before = device.snapshot();
    assert_eq!(before.fader, Some(-20.0));

    let mut faults = device.subscribe_faults();
    {
        let mut state = mock.state();
        state.fader = -3.0;
        state.silent_replies = 99;
    }
    device.refresh().await;

    // Previous snapshot survives; the failure lands on the fault channel.
    assert_eq!(device.snapshot(), before);
    let fault = timeout(Duration::from_secs(1), faults.recv())
        .await
        .expect("no fault reported")
        .unwrap();
    assert!(matches!(*fault, Cp750Error::NoResponse));
    device.shutdown().await;
}

#[tokio::test]
async fn available_follows_gate_when_power_drops() {
    let mock = MockCp750::spawn().await;
    let powered = Arc::new(AtomicBool::new(true));
    let lookup_powered = powered.clone();
    let config = mock.config().with_power_switch("booth_power");
    let mut device = Cp750Device::with_power_lookup(
        config,
        Arc::new(move |_| Some(lookup_powered.load(Ordering::Relaxed))),
    );

    device.refresh().await;
    assert!(device.available());
    assert!(!device.snapshot().is_offline());

    // Cutting power must drop the dead socket along with the snapshot.
    powered.store(false, Ordering::Relaxed);
    device.refresh().await;

    assert_eq!(device.snapshot(), DeviceSnapshot::offline());
    assert!(!device.available());
    device.shutdown().await;
}

#[tokio::test]
async fn refresh_joins_in_flight_cycle_without_second_battery() {
    let mock = MockCp750::spawn().await;
    let mut device = Cp750Device::new(mock.config());

    device.refresh().await;
    mock.clear_commands();
    mock.state().hang_replies = 1;

    let mut faults = device.subscribe_faults();
    tokio::join!(device.refresh(), async {
        // Land inside the stalled cycle's read-timeout window.
        tokio::time::sleep(Duration::from_millis(100)).await;
        device.refresh().await;
    });

    // The second refresh joined the stalled cycle: the log holds the one
    // hung query and no second battery.
    assert_eq!(mock.commands(), vec!["cp750.sys.fader ?"]);
    let fault = timeout(Duration::from_secs(1), faults.recv())
        .await
        .expect("no fault reported")
        .unwrap();
    assert!(matches!(*fault, Cp750Error::CommandFailure(_)));
    device.shutdown().await;
}

#[tokio::test]
async fn stalled_cycle_drops_timer_ticks_instead_of_queueing() {
    let mock = MockCp750::spawn().await;
    mock.state().hang_replies = 1;

    let mut device =
        Cp750Device::new(mock.config().with_poll_interval(Duration::from_millis(200)));
    let mut faults = device.subscribe_faults();

    // The startup cycle stalls in its read timeout while several ticks
    // elapse; those ticks must be dropped, not queued behind it.
    let fault = timeout(Duration::from_secs(5), faults.recv())
        .await
        .expect("stalled cycle never failed")
        .unwrap();
    assert!(matches!(*fault, Cp750Error::CommandFailure(_)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    device.shutdown().await;

    // One hung query plus the couple of ticks that fired after the stall;
    // queued ticks would burst roughly one battery per skipped interval.
    let batteries = mock
        .commands()
        .iter()
        .filter(|c| *c == QUERY_BATTERY[0])
        .count();
    assert!(
        (2..=5).contains(&batteries),
        "expected dropped ticks, saw {batteries} poll batteries"
    );
}

#[tokio::test]
async fn unknown_input_token_passes_through_unlabeled() {
    let mock = MockCp750::spawn().await;
    mock.state().input = "hdmi_9".to_string();

    let mut device = Cp750Device::new(mock.config());
    device.refresh().await;

    assert_eq!(
        device.snapshot().input,
        Some(InputSource::Other("hdmi_9".to_string()))
    );
    device.shutdown().await;
}

#[tokio::test]
async fn concurrent_poll_and_write_never_interleave() {
    let mock = MockCp750::spawn().await;
    let mut device = Cp750Device::new(mock.config());

    // Flush the startup cycle so the recorded log starts clean.
    device.refresh().await;
    mock.clear_commands();

    tokio::join!(device.refresh(), async {
        device.set_mute(true).await.unwrap();
    });

    let commands = mock.commands();
    assert!(commands.contains(&"cp750.sys.mute 1".to_string()));

    // Every query battery in the log is contiguous: the write command never
    // lands inside a poll's request/response sequence.
    for (i, command) in commands.iter().enumerate() {
        if command == QUERY_BATTERY[0] {
            assert_eq!(
                &commands[i..i + QUERY_BATTERY.len()],
                &QUERY_BATTERY,
                "poll battery interleaved with another operation"
            );
        }
    }
    device.shutdown().await;
}
