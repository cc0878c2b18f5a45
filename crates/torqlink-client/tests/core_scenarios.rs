//! End-to-end protocol scenarios driven against the sans-io core:
//! injected controller bytes in, events and wire frames out, with time
//! supplied by the test.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use torqlink_client::core::Core;
use torqlink_client::interlock::InterlockError;
use torqlink_client::{ClientConfig, ClientError, Event, SpindleCountSource};
use torqlink_frame::encode_frame_raw;

fn feed(core: &mut Core, mid: u16, revision: u16, spindle: u8, payload: &[u8], now: Instant) {
    let mut wire = BytesMut::new();
    encode_frame_raw(mid, revision, true, 1, spindle, payload, &mut wire).unwrap();
    core.handle_bytes(&wire, now);
}

/// MIDs of every frame queued for the wire.
fn sent_mids(core: &mut Core) -> Vec<u16> {
    core.take_outbox()
        .iter()
        .map(|frame| {
            std::str::from_utf8(&frame[4..8])
                .unwrap()
                .parse::<u16>()
                .unwrap()
        })
        .collect()
}

fn connected(config: ClientConfig) -> (Core, Instant) {
    let now = Instant::now();
    let mut core = Core::new(config);
    core.connection_opened(now);
    (core, now)
}

/// Connected, handshaken at the given revision, queues drained.
fn linked(config: ClientConfig, revision: &[u8]) -> (Core, Instant) {
    let (mut core, now) = connected(config);
    feed(&mut core, 3, 1, 1, revision, now);
    core.take_outbox();
    core.take_events();
    (core, now)
}

fn rev1_result(torque: &[u8; 6], angle: &[u8; 6], statuses: &[u8; 2]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(b"0000012345");
    p.extend_from_slice(torque);
    p.extend_from_slice(angle);
    p.extend_from_slice(statuses);
    p
}

fn rev23_result(spindle: u8, ok: bool, vin: &str) -> Vec<u8> {
    let status = if ok { b"11" } else { b"10" };
    let mut p = Vec::new();
    p.extend_from_slice(b"0000012345");
    p.extend_from_slice(format!("{spindle:02}").as_bytes());
    p.extend_from_slice(b"001234");
    p.extend_from_slice(b"000090");
    p.extend_from_slice(b"000500");
    p.extend_from_slice(b"002000");
    p.extend_from_slice(b"001250");
    p.extend_from_slice(status);
    p.extend_from_slice(b"2026-08-02:11:22:33");
    p.extend_from_slice(format!("{vin:<25}").as_bytes());
    p.extend_from_slice(b"0007");
    p.extend_from_slice(b"012");
    assert_eq!(p.len(), 95);
    p
}

// --- scenario 1: handshake ---------------------------------------------

#[test]
fn handshake_establishes_link_and_subscribes() {
    let (mut core, now) = connected(ClientConfig::new("10.0.0.7"));
    assert_eq!(sent_mids(&mut core), vec![1]);

    feed(&mut core, 3, 1, 1, b"02", now);

    let events = core.take_events();
    assert!(events.contains(&Event::LinkEstablished { revision: 2 }));
    assert_eq!(core.state().protocol.revision, 2);
    assert!(core.is_ready());

    let mids = sent_mids(&mut core);
    assert!(mids.contains(&60), "expected result subscription, got {mids:?}");
    assert!(mids.contains(&70), "expected alarm subscription, got {mids:?}");
}

// --- scenario 2: single-spindle cycle, revision 1 ----------------------

#[test]
fn single_spindle_cycle_rev1() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    feed(&mut core, 41, 1, 1, b"1110", now);
    let events = core.take_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::TighteningCycleStarted { .. })));

    feed(
        &mut core,
        61,
        1,
        1,
        &rev1_result(b"001234", b"000090", b"11"),
        now + Duration::from_millis(900),
    );

    let events = core.take_events();
    let spindle_result = events
        .iter()
        .find_map(|e| match e {
            Event::SpindleResult { result } => Some(result.clone()),
            _ => None,
        })
        .expect("spindle result");
    assert_eq!(spindle_result.torque, 12.34);
    assert_eq!(spindle_result.angle, 90.0);
    assert!(spindle_result.ok);

    let completed = events
        .iter()
        .find_map(|e| match e {
            Event::TighteningCycleCompleted {
                results,
                overall_ok,
                duration_ms,
            } => Some((results.clone(), *overall_ok, *duration_ms)),
            _ => None,
        })
        .expect("cycle completion");
    assert!(completed.1);
    assert_eq!(completed.0.len(), 1);
    assert_eq!(completed.2, 900);

    // The spindle result precedes the completion.
    let result_pos = events
        .iter()
        .position(|e| matches!(e, Event::SpindleResult { .. }))
        .unwrap();
    let complete_pos = events
        .iter()
        .position(|e| matches!(e, Event::TighteningCycleCompleted { .. }))
        .unwrap();
    assert!(result_pos < complete_pos);

    // Exactly one result acknowledge on the wire.
    let acks = sent_mids(&mut core)
        .into_iter()
        .filter(|&mid| mid == 62)
        .count();
    assert_eq!(acks, 1);
}

// --- scenario 3: watchdog ----------------------------------------------

#[test]
fn watchdog_declares_incomplete_cycle() {
    let mut config = ClientConfig::new("10.0.0.7");
    config.spindle_count = Some(2);
    let (mut core, now) = linked(config, b"02");

    feed(&mut core, 41, 1, 1, b"1110", now);
    feed(&mut core, 61, 2, 1, &rev23_result(1, true, ""), now);
    core.take_events();

    core.poll(now + Duration::from_secs(8));
    let events = core.take_events();
    let incomplete = events
        .iter()
        .find_map(|e| match e {
            Event::TighteningIncomplete {
                expected,
                received,
                results,
            } => Some((*expected, *received, results.len())),
            _ => None,
        })
        .expect("watchdog event");
    assert_eq!(incomplete, (2, 1, 1));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::TighteningCycleCompleted { .. })));

    // P4: the watchdog fired, so completion may never fire for this cycle.
    core.poll(now + Duration::from_secs(60));
    assert!(!core
        .take_events()
        .iter()
        .any(|e| matches!(
            e,
            Event::TighteningCycleCompleted { .. } | Event::TighteningIncomplete { .. }
        )));
}

#[test]
fn completed_cycle_never_reports_incomplete() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    feed(&mut core, 41, 1, 1, b"1110", now);
    feed(&mut core, 61, 1, 1, &rev1_result(b"001234", b"000090", b"11"), now);
    core.take_events();

    core.poll(now + Duration::from_secs(30));
    assert!(!core
        .take_events()
        .iter()
        .any(|e| matches!(e, Event::TighteningIncomplete { .. })));
}

// --- scenario 4: reconnect backoff -------------------------------------

#[test]
fn reconnect_delay_resets_after_success() {
    let (mut core, mut now) = connected(ClientConfig::new("10.0.0.7"));
    core.take_events();

    core.connection_lost(now);
    for _ in 0..3 {
        now += Duration::from_secs(40);
        assert!(core.take_reconnect_attempt(now));
        core.reconnect_failed(now);
    }
    core.take_events();

    // Success resets the schedule.
    core.connection_opened(now);
    core.take_events();
    core.connection_lost(now);

    let delays: Vec<u64> = core
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Reconnecting { delay_ms, .. } => Some(delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![1000]);
}

// --- scenario 5: interlock ordering ------------------------------------

#[test]
fn interlock_reports_first_violated_rule() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    // Tool disabled and controller not ready: rule 3 wins over rule 5.
    feed(&mut core, 41, 1, 1, b"0000", now);
    let err = core.start_tightening(now).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Interlock(InterlockError::ToolDisabled)
    ));

    // Enable the tool; the controller readiness violation surfaces next.
    feed(&mut core, 41, 1, 1, b"0100", now);
    let err = core.start_tightening(now).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Interlock(InterlockError::CtrlNotReady)
    ));

    // Ready and enabled, but no active job.
    feed(&mut core, 41, 1, 1, b"1100", now);
    let err = core.start_tightening(now).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Interlock(InterlockError::JobNotActive)
    ));

    // Job selected: the gate opens and MID 0043 goes out.
    feed(&mut core, 35, 1, 1, b"0002003", now);
    core.take_outbox();
    core.start_tightening(now).unwrap();
    assert_eq!(sent_mids(&mut core), vec![43]);
}

#[test]
fn interlock_rejects_before_any_bytes() {
    let now = Instant::now();
    let mut core = Core::new(ClientConfig::new("10.0.0.7"));
    let err = core.start_tightening(now).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Interlock(InterlockError::NotConnected)
    ));
    assert!(core.take_outbox().is_empty());
}

// --- scenario 6: batch reset protocol ----------------------------------

#[test]
fn batch_reset_confirmed_by_mid_0005() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    feed(&mut core, 31, 1, 1, b"000100050005", now);
    assert_eq!(core.state().batch.counter, 5);
    core.take_events();

    core.reset_batch(now).unwrap();
    assert!(core.state().batch.pending_reset);
    assert_eq!(core.state().batch.counter, 5, "counter must not move before the ack");

    feed(&mut core, 5, 1, 1, b"0020", now);
    assert_eq!(core.state().batch.counter, 0);
    assert!(!core.state().batch.pending_reset);
    assert!(core
        .take_events()
        .contains(&Event::BatchResetConfirmed));
}

#[test]
fn batch_decrement_acknowledged_by_mid_0021() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    feed(&mut core, 31, 1, 1, b"000100050003", now);
    core.take_events();

    let command_id = core.decrement_batch(now).unwrap();
    assert_eq!(sent_mids(&mut core), vec![21]);

    feed(&mut core, 21, 1, 1, b"", now);
    assert_eq!(core.state().batch.counter, 2);
    assert!(core.take_events().contains(&Event::CommandSuccess {
        mid: 21,
        command_id
    }));

    // Resolved, so the deadline pass has nothing left to expire.
    core.poll(now + Duration::from_secs(5));
    assert!(!core
        .take_events()
        .iter()
        .any(|e| matches!(e, Event::CommandTimeout { command_id: id, .. } if *id == command_id)));
}

#[test]
fn batch_reset_failure_leaves_counter() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    feed(&mut core, 31, 1, 1, b"000100050005", now);
    core.reset_batch(now).unwrap();
    core.take_events();

    feed(&mut core, 4, 1, 1, b"002076rejected", now);
    assert_eq!(core.state().batch.counter, 5);
    assert!(!core.state().batch.pending_reset);

    let events = core.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::BatchResetFailed {
            error_code: 76,
            ..
        }
    )));
}

// --- P3: one command per MID -------------------------------------------

#[test]
fn duplicate_command_produces_one_write_and_one_error() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    core.select_job(1, now).unwrap();
    let err = core.select_job(2, now).unwrap_err();
    assert!(matches!(err, ClientError::DuplicateCommand { mid: 34 }));
    assert_eq!(sent_mids(&mut core), vec![34]);
}

#[test]
fn duplicate_commands_allowed_when_configured() {
    let mut config = ClientConfig::new("10.0.0.7");
    config.allow_duplicate_commands = true;
    let (mut core, now) = linked(config, b"01");

    core.select_job(1, now).unwrap();
    core.select_job(2, now).unwrap();
    assert_eq!(sent_mids(&mut core), vec![34, 34]);
}

// --- P5: mandatory result acknowledge ----------------------------------

#[test]
fn result_ack_sent_even_when_parse_fails() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"02");

    // Truncated revision 2 payload: parse fails, ack still goes out.
    feed(&mut core, 61, 2, 1, b"000001234502", now);

    let events = core.take_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ParseError { mid: 61, .. })));
    assert_eq!(sent_mids(&mut core), vec![62]);
}

#[test]
fn old_results_are_acknowledged_too() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"02");

    feed(&mut core, 65, 2, 1, &rev23_result(1, true, ""), now);
    assert_eq!(sent_mids(&mut core), vec![62]);
}

// --- P7: revision routing ----------------------------------------------

#[test]
fn blank_header_revision_falls_back_to_declared() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"02");

    // Header revision field left blank (zero): declared revision 2 wins.
    feed(&mut core, 61, 0, 1, &rev23_result(3, true, "VIN"), now);
    let events = core.take_events();
    let result = events
        .iter()
        .find_map(|e| match e {
            Event::SpindleResult { result } => Some(result.clone()),
            _ => None,
        })
        .expect("decoded result");
    assert_eq!(result.spindle, 3);
    assert_eq!(result.vin.as_deref(), Some("VIN"));
}

// --- P8: spindle count authority ---------------------------------------

#[test]
fn config_spindle_count_is_sticky() {
    let mut config = ClientConfig::new("10.0.0.7");
    config.spindle_count = Some(2);
    let (mut core, now) = linked(config, b"02");

    feed(&mut core, 101, 1, 1, b"06", now);
    assert_eq!(core.spindle_count(), 2);

    feed(&mut core, 61, 2, 1, &rev23_result(5, true, ""), now);
    assert_eq!(core.spindle_count(), 2);
    assert_eq!(
        core.state().tool.spindle_count_source,
        SpindleCountSource::Config
    );
}

#[test]
fn default_spindle_count_upgraded_by_result() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"02");

    feed(&mut core, 61, 2, 1, &rev23_result(3, true, ""), now);
    assert_eq!(core.spindle_count(), 3);
    assert_eq!(
        core.state().tool.spindle_count_source,
        SpindleCountSource::Mid061
    );
    assert!(core
        .take_events()
        .contains(&Event::SpindleCountUpdated {
            count: 3,
            source: SpindleCountSource::Mid061
        }));
}

// --- VIN locking across the traceability context ------------------------

#[test]
fn vin_locks_on_first_result_and_unlocks_on_batch_start() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    core.download_vin("CAR777", now).unwrap();
    feed(&mut core, 5, 1, 1, b"0050", now);
    core.take_events();

    feed(&mut core, 41, 1, 1, b"1110", now);
    feed(&mut core, 61, 1, 1, &rev1_result(b"001234", b"000090", b"11"), now);
    let events = core.take_events();
    assert!(events.contains(&Event::VinLocked {
        vin: "CAR777".to_string()
    }));
    assert!(core.state().product.vin_locked);

    feed(&mut core, 31, 1, 1, b"000300040000", now);
    assert!(!core.state().product.vin_locked);
}

// --- batch progression over cycles -------------------------------------

#[test]
fn batch_counts_cycles_and_completes() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"01");

    feed(&mut core, 31, 1, 1, b"000900020000", now);
    core.take_events();

    feed(&mut core, 41, 1, 1, b"1110", now);
    feed(&mut core, 61, 1, 1, &rev1_result(b"001000", b"000090", b"11"), now);
    let events = core.take_events();
    assert!(events.contains(&Event::BatchProgress {
        counter: 1,
        size: 2
    }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::BatchCompleted { .. })));

    feed(&mut core, 41, 1, 1, b"1100", now); // tool stops
    feed(&mut core, 41, 1, 1, b"1110", now); // second cycle
    feed(&mut core, 61, 1, 1, &rev1_result(b"001000", b"000090", b"11"), now);
    let events = core.take_events();
    assert!(events.contains(&Event::BatchProgress {
        counter: 2,
        size: 2
    }));
    assert!(events.contains(&Event::BatchCompleted { batch_id: 9 }));
    assert!(core.state().batch.complete);
    assert!(!core.state().batch.active);

    // A completed batch stops counting.
    feed(&mut core, 41, 1, 1, b"1100", now);
    feed(&mut core, 41, 1, 1, b"1110", now);
    feed(&mut core, 61, 1, 1, &rev1_result(b"001000", b"000090", b"11"), now);
    assert!(!core
        .take_events()
        .iter()
        .any(|e| matches!(e, Event::BatchProgress { .. })));
    assert_eq!(core.state().batch.counter, 2);
}

// --- snapshots and events serialize for external consumers -------------

#[test]
fn snapshot_and_events_serialize_to_json() {
    let (mut core, now) = linked(ClientConfig::new("10.0.0.7"), b"02");
    feed(&mut core, 61, 2, 1, &rev23_result(1, true, "VIN9"), now);

    let snapshot = serde_json::to_value(core.snapshot()).unwrap();
    assert_eq!(snapshot["protocol"]["revision"], 2);
    assert_eq!(snapshot["connection"]["connected"], true);

    for event in core.take_events() {
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
    }
}

// --- failed spindle fails the cycle ------------------------------------

#[test]
fn multi_spindle_cycle_overall_verdict() {
    let mut config = ClientConfig::new("10.0.0.7");
    config.spindle_count = Some(2);
    let (mut core, now) = linked(config, b"02");

    feed(&mut core, 41, 1, 1, b"1110", now);
    feed(&mut core, 61, 2, 1, &rev23_result(1, true, ""), now);
    feed(&mut core, 61, 2, 1, &rev23_result(2, false, ""), now);

    let events = core.take_events();
    let completed = events
        .iter()
        .find_map(|e| match e {
            Event::TighteningCycleCompleted {
                results,
                overall_ok,
                ..
            } => Some((results.len(), *overall_ok)),
            _ => None,
        })
        .expect("cycle completion");
    assert_eq!(completed, (2, false));

    // One acknowledge per result.
    let acks = sent_mids(&mut core)
        .into_iter()
        .filter(|&mid| mid == 62)
        .count();
    assert_eq!(acks, 2);
}
