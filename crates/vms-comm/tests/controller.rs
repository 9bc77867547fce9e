//! Controller behaviour against mock and replay sources

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep, timeout};
use vms_comm::config::CommConfig;
use vms_comm::extract::is_message_line;
use vms_comm::transport::{MockHandle, MockSourceFactory};
use vms_comm::{
    CommController, CommError, CommEvent, InMemoryParameterStore, LogDetail, ParameterStore,
    ParseMode, SpnTable, TransportError, TransportKind,
};

const EEC1_1800_RPM: &str = "J0CF00400FFFF7D403800FFFF";
const PID190_1800_RPM: &str = "R80BE201C";
const WAIT: Duration = Duration::from_secs(2);

/// Config for mock tests: timers off unless a test turns them on
fn quiet_config(transport: TransportKind) -> CommConfig {
    let mut config = CommConfig {
        transport,
        ..Default::default()
    };
    config.keepalive.enabled = false;
    config.health.enabled = false;
    config
}

fn spawn(
    config: CommConfig,
    factory: MockSourceFactory,
) -> (CommController, Arc<InMemoryParameterStore>) {
    let store = Arc::new(InMemoryParameterStore::new());
    let (controller, _task) = CommController::spawn_with_factory(
        config,
        Arc::new(SpnTable::standard()),
        store.clone(),
        Arc::new(factory),
    );
    (controller, store)
}

fn serial_mock() -> (MockSourceFactory, MockHandle) {
    let mut factory = MockSourceFactory::new();
    let handle = factory.handle(TransportKind::Serial);
    (factory, handle)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<CommEvent>,
    matches: impl Fn(&CommEvent) -> bool,
) -> CommEvent {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("event not received in time")
}

#[tokio::test]
async fn test_every_line_counted_exactly_once() {
    let (factory, serial) = serial_mock();
    let (controller, _store) = spawn(quiet_config(TransportKind::Serial), factory);
    controller.start().await.unwrap();

    for line in [
        EEC1_1800_RPM,
        "J18FEEE00825A202CFFFFFFFF",
        "garbage",
        PID190_1800_RPM,
        "J18FEF1",
        "R806E82",
        "V",
        "R80BE20",
        "J18FEF100FFFF7D000000FFFF",
    ] {
        serial.push_line(line);
    }

    wait_until(|| controller.counters().ingested() == 8).await;
    let counters = controller.counters();
    assert_eq!(counters.total, 5);
    assert_eq!(counters.bad, 3);
}

#[tokio::test]
async fn test_decoded_values_reach_store() {
    let (factory, serial) = serial_mock();
    let (controller, store) = spawn(quiet_config(TransportKind::Serial), factory);
    controller.start().await.unwrap();

    serial.push_line(EEC1_1800_RPM);
    wait_until(|| controller.counters().total == 1).await;

    let speed = store.read(190).unwrap();
    assert!(speed.has_data);
    assert_eq!(speed.metric, 1800.0);
}

#[tokio::test]
async fn test_parse_mode_suppresses_decoding_only() {
    let (factory, serial) = serial_mock();
    let (controller, store) = spawn(quiet_config(TransportKind::Serial), factory);
    controller.start().await.unwrap();
    controller.set_parse_mode(ParseMode::Ignore1708).await.unwrap();

    serial.push_line(PID190_1800_RPM);
    wait_until(|| controller.counters().total == 1).await;
    assert!(store.read(190).is_none());

    controller.set_parse_mode(ParseMode::ParseAll).await.unwrap();
    serial.push_line(PID190_1800_RPM);
    wait_until(|| controller.counters().total == 2).await;
    assert_eq!(store.read(190).unwrap().imperial, 1800.0);
    assert_eq!(
        controller.status().await.unwrap().parse_mode,
        ParseMode::ParseAll
    );
}

#[tokio::test]
async fn test_switch_transport_closes_old_source_first() {
    let mut factory = MockSourceFactory::new();
    let serial = factory.handle(TransportKind::Serial);
    let network = factory.handle(TransportKind::Network);
    let (controller, _store) = spawn(quiet_config(TransportKind::Serial), factory);
    let mut events = controller.subscribe();

    controller.start().await.unwrap();
    serial.push_on_close(EEC1_1800_RPM);
    controller.switch_transport(TransportKind::Network).await.unwrap();

    assert!(!serial.is_open());
    assert_eq!(serial.close_count(), 1);
    assert!(network.is_open());

    let closed = wait_for_event(&mut events, |e| matches!(e, CommEvent::Closed { .. })).await;
    assert_eq!(
        closed,
        CommEvent::Closed {
            kind: TransportKind::Serial,
            reason: None
        }
    );
    wait_for_event(&mut events, |e| {
        matches!(e, CommEvent::Opened { kind: TransportKind::Network, .. })
    })
    .await;

    network.push_line(PID190_1800_RPM);
    wait_until(|| controller.counters().total == 1).await;
    sleep(Duration::from_millis(20)).await;
    // the line released while the serial source closed is never read
    assert_eq!(controller.counters().total, 1);
    assert_eq!(controller.counters().bad, 0);
}

#[tokio::test]
async fn test_switch_to_same_transport_is_noop() {
    let (factory, serial) = serial_mock();
    let (controller, _store) = spawn(quiet_config(TransportKind::Serial), factory);
    controller.start().await.unwrap();

    controller.switch_transport(TransportKind::Serial).await.unwrap();
    assert_eq!(serial.open_count(), 1);
    assert_eq!(serial.close_count(), 0);
}

#[tokio::test]
async fn test_switch_while_stopped_only_selects() {
    let mut factory = MockSourceFactory::new();
    let network = factory.handle(TransportKind::Network);
    let (controller, _store) = spawn(quiet_config(TransportKind::Serial), factory);

    controller.switch_transport(TransportKind::Network).await.unwrap();
    assert_eq!(network.open_count(), 0);

    let status = controller.status().await.unwrap();
    assert_eq!(status.transport, TransportKind::Network);
    assert!(!status.running);

    controller.start().await.unwrap();
    assert!(network.is_open());
}

#[tokio::test]
async fn test_switch_com_port() {
    let (factory, serial) = serial_mock();
    let mut config = quiet_config(TransportKind::Serial);
    config.serial.port = "/dev/ttyUSB0".to_string();
    let (controller, _store) = spawn(config, factory);
    controller.start().await.unwrap();

    controller.switch_com_port("/dev/ttyUSB0").await.unwrap();
    assert_eq!(serial.open_count(), 1);

    controller.switch_com_port("/dev/ttyUSB1").await.unwrap();
    assert_eq!(serial.close_count(), 1);
    assert_eq!(serial.open_count(), 2);
    assert!(serial.is_open());
    assert_eq!(controller.status().await.unwrap().serial_port, "/dev/ttyUSB1");
}

#[tokio::test]
async fn test_switch_com_port_ignored_for_other_transports() {
    let mut factory = MockSourceFactory::new();
    let replay = factory.handle(TransportKind::LogReplay);
    let (controller, _store) = spawn(quiet_config(TransportKind::LogReplay), factory);
    controller.start().await.unwrap();

    let before = controller.status().await.unwrap().serial_port;
    controller.switch_com_port("COM9").await.unwrap();

    assert_eq!(controller.status().await.unwrap().serial_port, before);
    assert_eq!(replay.open_count(), 1);
    assert_eq!(replay.close_count(), 0);
}

#[tokio::test]
async fn test_open_failure_is_not_fatal() {
    let (factory, serial) = serial_mock();
    serial.set_fail_open(true);
    let (controller, _store) = spawn(quiet_config(TransportKind::Serial), factory);
    let mut events = controller.subscribe();

    let result = controller.start().await;
    assert!(matches!(
        result,
        Err(CommError::Transport(TransportError::OpenFailed(_)))
    ));
    wait_for_event(&mut events, |e| {
        matches!(e, CommEvent::OpenFailed { kind: TransportKind::Serial, .. })
    })
    .await;
    assert_eq!(controller.status().await.unwrap().source, None);

    serial.set_fail_open(false);
    controller.start().await.unwrap();
    serial.push_line(EEC1_1800_RPM);
    wait_until(|| controller.counters().total == 1).await;
}

#[tokio::test]
async fn test_keepalive_sent_on_open_and_periodically() {
    let (factory, serial) = serial_mock();
    let mut config = quiet_config(TransportKind::Serial);
    config.keepalive.enabled = true;
    config.keepalive.interval_ms = 20;
    let (controller, _store) = spawn(config, factory);

    controller.start().await.unwrap();
    assert_eq!(serial.sent(), vec![b"V".to_vec()]);

    wait_until(|| serial.sent().len() >= 3).await;
    assert!(serial.sent().iter().all(|sent| sent == b"V"));
}

#[tokio::test]
async fn test_no_keepalive_for_replay() {
    let mut factory = MockSourceFactory::new();
    let replay = factory.handle(TransportKind::LogReplay);
    let mut config = quiet_config(TransportKind::LogReplay);
    config.keepalive.enabled = true;
    config.keepalive.interval_ms = 5;
    let (controller, _store) = spawn(config, factory);

    controller.start().await.unwrap();
    sleep(Duration::from_millis(40)).await;
    assert!(replay.sent().is_empty());
}

#[tokio::test]
async fn test_stall_detected_and_recovered() {
    let (factory, serial) = serial_mock();
    let mut config = quiet_config(TransportKind::Serial);
    config.health.enabled = true;
    config.health.interval_ms = 20;
    let (controller, _store) = spawn(config, factory);
    let mut events = controller.subscribe();

    controller.start().await.unwrap();
    let stalled = wait_for_event(&mut events, |e| matches!(e, CommEvent::Stalled { .. })).await;
    assert_eq!(
        stalled,
        CommEvent::Stalled {
            kind: TransportKind::Serial,
            total: 0
        }
    );
    assert!(controller.counters().stalled);
    // detect-only: the source stays open
    assert_eq!(serial.open_count(), 1);
    assert!(serial.is_open());

    serial.push_line(EEC1_1800_RPM);
    wait_for_event(&mut events, |e| matches!(e, CommEvent::Recovered { .. })).await;
    let counters = controller.counters();
    assert!(!counters.stalled);
    assert_eq!(counters.stall_events, 1);
}

#[tokio::test]
async fn test_auto_reconnect_reopens_stalled_source() {
    let (factory, serial) = serial_mock();
    let mut config = quiet_config(TransportKind::Serial);
    config.health.enabled = true;
    config.health.interval_ms = 20;
    config.health.auto_reconnect = true;
    let (controller, _store) = spawn(config, factory);

    controller.start().await.unwrap();
    wait_until(|| serial.open_count() >= 2).await;
    assert!(serial.close_count() >= 1);
}

#[tokio::test]
async fn test_auto_reconnect_retries_failed_open() {
    let (factory, serial) = serial_mock();
    serial.set_fail_open(true);
    let mut config = quiet_config(TransportKind::Serial);
    config.health.enabled = true;
    config.health.interval_ms = 20;
    config.health.auto_reconnect = true;
    let (controller, _store) = spawn(config, factory);

    assert!(controller.start().await.is_err());
    serial.set_fail_open(false);
    wait_until(|| serial.is_open()).await;
}

#[tokio::test]
async fn test_replay_is_cyclic_and_logged() {
    let dir = tempfile::tempdir().unwrap();
    let replay_path = dir.path().join("capture.vms");
    let log_path = dir.path().join("session.vms");
    std::fs::write(
        &replay_path,
        "R80BE201C\n\nEnd of Message\n\nR806E82\n\nEnd of Message\n\nJ0CF00400FFFF7D403800FFFF\n",
    )
    .unwrap();

    let mut config = CommConfig {
        transport: TransportKind::LogReplay,
        ..Default::default()
    };
    config.replay.path = replay_path;
    config.replay.interval_ms = 1;
    config.session_log.enabled = true;
    config.session_log.path = log_path.clone();
    config.session_log.detail = LogDetail::RawOnly;

    let store = Arc::new(InMemoryParameterStore::new());
    let (controller, task) =
        CommController::spawn(config, Arc::new(SpnTable::standard()), store.clone());
    controller.start().await.unwrap();

    wait_until(|| controller.counters().total >= 7).await;
    controller.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(controller.counters().bad, 0);
    assert_eq!(store.read(190).unwrap().imperial, 1800.0);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let replayed: Vec<&str> = log.lines().filter(|line| is_message_line(line)).collect();
    let expected = ["R80BE201C", "R806E82", "J0CF00400FFFF7D403800FFFF"];
    assert!(replayed.len() >= 7);
    for (i, line) in replayed.iter().enumerate() {
        assert_eq!(*line, expected[i % 3], "record {}", i);
    }
}

#[tokio::test]
async fn test_set_replay_file_restarts_running_replay() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.vms");
    let second = dir.path().join("second.vms");
    std::fs::write(&first, format!("{}\n", PID190_1800_RPM)).unwrap();
    // PID 84 road speed: 110 half-mph units
    std::fs::write(&second, "R80546E\n").unwrap();

    let mut config = quiet_config(TransportKind::LogReplay);
    config.replay.path = first;
    config.replay.interval_ms = 1;

    let store = Arc::new(InMemoryParameterStore::new());
    let (controller, task) =
        CommController::spawn(config, Arc::new(SpnTable::standard()), store.clone());
    let mut events = controller.subscribe();
    controller.start().await.unwrap();
    wait_until(|| store.read(190).is_some()).await;
    assert!(store.read(84).is_none());

    controller.set_replay_file(&second).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, CommEvent::Closed { .. })).await;
    wait_for_event(&mut events, |e| matches!(e, CommEvent::Opened { .. })).await;
    wait_until(|| store.read(84).is_some_and(|p| p.has_data)).await;
    assert_eq!(store.read(84).unwrap().imperial, 55.0);

    let status = controller.status().await.unwrap();
    assert!(status.running);
    assert_eq!(status.replay_file, second);

    let missing = dir.path().join("missing.vms");
    assert!(controller.set_replay_file(&missing).await.is_err());

    controller.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_set_replay_file_while_stopped_only_selects() {
    let dir = tempfile::tempdir().unwrap();
    let mut factory = MockSourceFactory::new();
    let replay = factory.handle(TransportKind::LogReplay);
    let (controller, _store) = spawn(quiet_config(TransportKind::LogReplay), factory);

    let path = dir.path().join("later.vms");
    controller.set_replay_file(&path).await.unwrap();
    assert_eq!(replay.open_count(), 0);
    assert_eq!(controller.status().await.unwrap().replay_file, path);
}

#[tokio::test]
async fn test_logging_toggled_at_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runtime.vms");
    let (factory, serial) = serial_mock();
    let (controller, _store) = spawn(quiet_config(TransportKind::Serial), factory);
    controller.start().await.unwrap();

    controller.set_log_detail(LogDetail::Full).await.unwrap();
    controller
        .set_logging(true, Some(log_path.clone()))
        .await
        .unwrap();
    assert!(controller.status().await.unwrap().logging);

    serial.push_line(PID190_1800_RPM);
    wait_until(|| controller.counters().total == 1).await;
    controller.set_logging(false, None).await.unwrap();

    serial.push_line(PID190_1800_RPM);
    wait_until(|| controller.counters().total == 2).await;

    let status = controller.status().await.unwrap();
    assert!(!status.logging);
    assert_eq!(status.log_detail, LogDetail::Full);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.matches("End of Message").count(), 1);
    assert!(log.contains("190 engine_speed = 1800 / 1800"));
}

#[tokio::test]
async fn test_stop_closes_source() {
    let (factory, serial) = serial_mock();
    let (controller, _store) = spawn(quiet_config(TransportKind::Serial), factory);
    let mut events = controller.subscribe();
    controller.start().await.unwrap();

    controller.stop().await.unwrap();
    let closed = wait_for_event(&mut events, |e| matches!(e, CommEvent::Closed { .. })).await;
    assert!(matches!(
        closed,
        CommEvent::Closed {
            kind: TransportKind::Serial,
            ..
        }
    ));
    assert!(!serial.is_open());
    assert!(!controller.status().await.unwrap().running);
}
