//! Unit tests for the monitoring scheduler.

use std::sync::Mutex;
use std::sync::mpsc::Receiver;
use std::time::Instant;

use rstest::{fixture, rstest};

use super::*;

const FAST: MonitorSettings = MonitorSettings {
    period: Duration::from_millis(40),
    call_timeout: Duration::from_millis(200),
};

/// Position source answering from a script, recording every call.
#[derive(Default)]
struct ScriptedSource {
    calls: Mutex<Vec<(MonitoringTarget, Duration)>>,
    stalls: Mutex<Vec<MonitoringTarget>>,
}

impl ScriptedSource {
    fn stall_on(&self, target: MonitoringTarget) {
        lock(&self.stalls).push(target);
    }

    fn calls(&self) -> Vec<MonitoringTarget> {
        lock(&self.calls)
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }
}

impl PositionSource for ScriptedSource {
    fn get_position(&self, target: &MonitoringTarget, timeout: Duration) -> Response {
        lock(&self.calls).push((target.clone(), timeout));
        if lock(&self.stalls).contains(target) {
            thread::sleep(timeout);
            return Response::timeout();
        }
        Response::success(i64::from(target.channel()) * 100)
    }
}

struct Rig {
    source: Arc<ScriptedSource>,
    updates: Receiver<PositionUpdate>,
    handle: MonitorHandle,
}

#[fixture]
fn rig() -> Rig {
    let source = Arc::new(ScriptedSource::default());
    let (sender, updates) = mpsc::channel();
    let handle = spawn_monitor(
        Arc::clone(&source) as Arc<dyn PositionSource>,
        Arc::new(sender),
        FAST,
    )
    .expect("spawn monitor");
    Rig {
        source,
        updates,
        handle,
    }
}

fn target(channel: u8) -> MonitoringTarget {
    MonitoringTarget::new("97251312", channel)
}

fn next_update(rig: &Rig) -> PositionUpdate {
    rig.updates
        .recv_timeout(Duration::from_secs(3))
        .expect("update before timeout")
}

#[rstest]
fn polls_active_targets_and_publishes_positions(rig: Rig) {
    rig.handle.add_target(target(2));

    let update = next_update(&rig);

    assert_eq!(update.target, target(2));
    assert_eq!(update.result, Ok(200));
}

#[rstest]
fn paused_targets_are_not_polled(rig: Rig) {
    rig.handle.add_target(target(1));
    assert!(rig.handle.set_active(&target(1), false));
    rig.handle.add_target(target(2));
    assert!(rig.handle.set_active(&target(2), true));

    // A cycle already underway may still carry the target once.
    let updates: Vec<_> = (0..5).map(|_| next_update(&rig).target).collect();
    let paused_polls = updates.iter().filter(|polled| **polled == target(1)).count();

    assert!(paused_polls <= 1, "paused target polled: {updates:?}");
    assert!(updates.iter().skip(2).all(|polled| *polled == target(2)));
    assert!(rig.source.calls().contains(&target(2)));
}

#[rstest]
fn a_stalled_target_does_not_starve_the_next(rig: Rig) {
    rig.source.stall_on(target(1));
    rig.handle.add_target(target(1));
    rig.handle.add_target(target(2));

    let mut seen = Vec::new();
    while seen.len() < 4 {
        seen.push(next_update(&rig));
    }

    assert!(seen.iter().any(|update| {
        update.target == target(1) && update.result == Err("timeout".to_owned())
    }));
    assert!(
        seen.iter()
            .any(|update| update.target == target(2) && update.result == Ok(200))
    );
}

#[rstest]
fn each_poll_uses_the_configured_timeout(rig: Rig) {
    rig.handle.add_target(target(1));

    next_update(&rig);

    let calls = lock(&rig.source.calls).clone();
    assert!(calls.iter().all(|(_, timeout)| *timeout == FAST.call_timeout));
}

#[rstest]
fn mutations_do_not_wait_for_a_stalled_poll(rig: Rig) {
    rig.source.stall_on(target(1));
    rig.handle.add_target(target(1));
    // Let the scheduler enter the stalled call.
    thread::sleep(FAST.period + Duration::from_millis(20));

    let started = Instant::now();
    rig.handle.add_target(target(3));
    assert!(rig.handle.set_active(&target(1), false));
    let snapshot = rig.handle.targets();

    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(snapshot, vec![(target(1), false), (target(3), true)]);
}

#[rstest]
fn retargeting_moves_polling_to_the_new_channel(rig: Rig) {
    rig.handle.add_target(target(1));
    assert_eq!(next_update(&rig).target, target(1));

    rig.handle.retarget(&target(1), target(4));

    let update = (0..5)
        .map(|_| next_update(&rig))
        .find(|update| update.target == target(4))
        .expect("new channel polled");
    assert_eq!(update.result, Ok(400));
}

#[rstest]
fn stop_interrupts_the_period_wait() {
    let source = Arc::new(ScriptedSource::default());
    let slow = MonitorSettings {
        period: Duration::from_secs(30),
        call_timeout: Duration::from_millis(100),
    };
    let handle = spawn_monitor(source, Arc::new(LoggingListener), slow).expect("spawn");
    thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    handle.stop();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!handle.is_running());
    handle.stop();
}

#[rstest]
fn stop_waits_for_the_call_in_flight_and_skips_the_rest() {
    let source = Arc::new(ScriptedSource::default());
    let (sender, updates) = mpsc::channel();
    let settings = MonitorSettings {
        period: Duration::from_millis(40),
        call_timeout: Duration::from_millis(600),
    };
    let handle = spawn_monitor(
        Arc::clone(&source) as Arc<dyn PositionSource>,
        Arc::new(sender),
        settings,
    )
    .expect("spawn monitor");
    source.stall_on(target(1));
    handle.add_target(target(1));
    handle.add_target(target(2));

    let deadline = Instant::now() + Duration::from_secs(3);
    while !source.calls().contains(&target(1)) {
        assert!(Instant::now() < deadline, "stalled target never polled");
        thread::sleep(Duration::from_millis(5));
    }
    let stall_seen = Instant::now();

    handle.stop();

    // The stalled call ran its full timeout before the thread could finish.
    assert!(
        stall_seen.elapsed() >= settings.call_timeout - Duration::from_millis(50),
        "stop returned after {:?}",
        stall_seen.elapsed()
    );
    assert!(!handle.is_running());
    let update = updates.try_recv().expect("stalled call published its result");
    assert_eq!(update.target, target(1));
    assert_eq!(update.result, Err("timeout".to_owned()));
    assert_eq!(source.calls(), vec![target(1)]);
}

#[rstest]
fn non_integer_payloads_become_errors() {
    let update = PositionUpdate::from_response(target(1), &Response::success("far"));

    assert_eq!(
        update.result,
        Err("non-integer position: \"far\"".to_owned())
    );
}

#[rstest]
fn error_payloads_are_passed_through() {
    let update = PositionUpdate::from_response(
        target(1),
        &Response::error("Failed to get position: device offline"),
    );

    assert_eq!(
        update.result,
        Err("Failed to get position: device offline".to_owned())
    );
}
