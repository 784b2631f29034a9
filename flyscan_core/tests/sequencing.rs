use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flyscan_core::mocks::{Call, CallLog, RecordingMotor, RecordingTrigger};
use flyscan_core::{
    CrystalGeometry, EnergyRange, FlyScanController, HardwareFault, MotionCfg, PositioningCfg,
    ScanError, ScanPhase, Timeouts, build_controller,
};
use flyscan_traits::{Clock, ManualClock};
use rstest::{fixture, rstest};

const MAX_SPEED: f64 = 0.5;

fn si111() -> CrystalGeometry {
    CrystalGeometry::new(3.13555)
}

fn standard_range() -> EnergyRange {
    EnergyRange::new(10_000.0, 12_000.0, 1000, 5.0)
}

struct Rig {
    log: CallLog,
    trigger: RecordingTrigger,
    clock: ManualClock,
    ctl: FlyScanController<RecordingMotor, RecordingTrigger>,
}

fn rig_with(motor: RecordingMotor, trigger: RecordingTrigger, log: CallLog) -> Rig {
    let clock = ManualClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let timeouts = Timeouts {
        in_position: Duration::from_secs(1),
        run_down: Duration::from_secs(1),
    };
    let ctl = build_controller(
        motor,
        trigger.clone(),
        MotionCfg::default(),
        PositioningCfg::default(),
        timeouts,
        Some(shared),
    )
    .expect("valid config");
    Rig {
        log,
        trigger,
        clock,
        ctl,
    }
}

#[fixture]
fn rig() -> Rig {
    let log = CallLog::new();
    let motor = RecordingMotor::new(log.clone(), 15.0);
    let trigger = RecordingTrigger::new(log.clone());
    rig_with(motor, trigger, log)
}

fn scan_error(err: &eyre::Report) -> &ScanError {
    err.downcast_ref::<ScanError>()
        .unwrap_or_else(|| panic!("expected ScanError, got {err:?}"))
}

#[rstest]
fn prepare_then_execute_issues_commands_in_order(mut rig: Rig) {
    let plan = rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.execute().unwrap();

    assert_eq!(
        rig.log.motion_calls(),
        vec![
            Call::SetSpeed(MAX_SPEED),
            Call::MoveAsync(plan.run_up_position),
            Call::SetSpeed(plan.speed()),
            Call::Arm,
            Call::MoveAsync(plan.run_down_position),
        ]
    );
    assert_eq!(rig.ctl.phase(), ScanPhase::Running);
}

#[rstest]
fn gate_is_written_before_the_run_up_move(mut rig: Rig) {
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    let gate = *rig.ctl.gate().unwrap();
    assert_eq!(
        rig.log.calls(),
        vec![
            Call::SetSpeed(MAX_SPEED),
            Call::GateStart(gate.start),
            Call::GateWidth(gate.width),
            Call::GateStep(gate.step),
            Call::MoveAsync(rig.ctl.plan().unwrap().run_up_position),
        ]
    );
    assert_eq!(rig.ctl.phase(), ScanPhase::Prepared);
}

#[test]
fn armed_module_is_disarmed_before_gate_writes() {
    let log = CallLog::new();
    let motor = RecordingMotor::new(log.clone(), 15.0);
    let trigger = RecordingTrigger::new(log.clone()).pre_armed();
    let mut rig = rig_with(motor, trigger, log);

    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    let calls = rig.log.calls();
    assert_eq!(calls[0], Call::SetSpeed(MAX_SPEED));
    assert_eq!(calls[1], Call::Disarm);
    assert!(calls[2].is_gate_write());
}

#[test]
fn arm_failure_cleans_up_exactly_once() {
    let log = CallLog::new();
    let motor = RecordingMotor::new(log.clone(), 15.0);
    let mut trigger = RecordingTrigger::new(log.clone());
    trigger.fail_arm = true;
    let mut rig = rig_with(motor, trigger, log);

    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.log.clear();
    let err = rig.ctl.execute().expect_err("arm should fail");

    assert!(matches!(
        scan_error(&err),
        ScanError::ExecuteFailed { step: "arm", .. }
    ));
    assert_eq!(rig.log.count(|c| *c == Call::Disarm), 1);
    assert_eq!(rig.log.count(|c| *c == Call::SetSpeed(MAX_SPEED)), 1);
    assert!(!rig.log.calls().iter().any(|c| matches!(c, Call::MoveAsync(_))));
    assert_eq!(rig.ctl.phase(), ScanPhase::Aborted);
    assert!(!rig.trigger.armed());
}

#[rstest]
fn complete_is_idempotent_and_leaves_module_disarmed(mut rig: Rig) {
    rig.ctl.complete().unwrap();
    rig.ctl.complete().unwrap();
    assert_eq!(rig.ctl.phase(), ScanPhase::Idle);
    assert!(!rig.trigger.armed());

    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.execute().unwrap();
    rig.ctl.complete().unwrap();
    rig.ctl.complete().unwrap();
    assert_eq!(rig.ctl.phase(), ScanPhase::Completed);
    assert!(!rig.trigger.armed());
    assert_eq!(
        rig.log.calls().last(),
        Some(&Call::SetSpeed(MAX_SPEED))
    );
}

#[rstest]
fn complete_from_prepared_aborts(mut rig: Rig) {
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.complete().unwrap();
    assert_eq!(rig.ctl.phase(), ScanPhase::Aborted);
}

#[rstest]
fn degenerate_scan_keeps_max_speed(mut rig: Rig) {
    let range = EnergyRange::new(10_000.0, 10_000.0, 10, 5.0);
    let plan = rig.ctl.prepare(&range, &si111()).unwrap();
    assert!(plan.is_degenerate());
    rig.ctl.execute().unwrap();
    rig.ctl.wait_for_run_down(Duration::from_secs(1)).unwrap();
    rig.ctl.complete().unwrap();

    assert_eq!(rig.log.count(|c| matches!(c, Call::SetSpeed(v) if *v != MAX_SPEED)), 0);
    let gate = rig.ctl.gate().unwrap();
    assert_eq!((gate.width, gate.step), (0.0, 0.0));
    assert_eq!(gate.pulse_count(), 1);
    assert_eq!(rig.ctl.phase(), ScanPhase::Completed);
}

#[rstest]
#[case::no_points(EnergyRange::new(10_000.0, 12_000.0, 0, 5.0))]
#[case::no_time(EnergyRange::new(10_000.0, 12_000.0, 100, 0.0))]
#[case::too_fast(EnergyRange::new(10_000.0, 12_000.0, 100, 1.0))]
fn invalid_requests_never_touch_hardware(mut rig: Rig, #[case] range: EnergyRange) {
    let err = rig.ctl.prepare(&range, &si111()).unwrap_err();
    assert!(matches!(scan_error(&err), ScanError::InvalidScanRequest(_)));
    assert!(rig.log.calls().is_empty());
    assert_eq!(rig.ctl.phase(), ScanPhase::Idle);
}

#[rstest]
fn unreachable_energy_is_out_of_range(mut rig: Rig) {
    let range = EnergyRange::new(1_000.0, 12_000.0, 100, 50.0);
    let err = rig.ctl.prepare(&range, &si111()).unwrap_err();
    assert!(matches!(scan_error(&err), ScanError::OutOfRange(_)));
    assert!(rig.log.calls().is_empty());
}

#[rstest]
fn out_of_order_calls_fail_fast(mut rig: Rig) {
    let err = rig.ctl.execute().unwrap_err();
    assert_eq!(
        scan_error(&err),
        &ScanError::InvalidState {
            op: "execute",
            phase: ScanPhase::Idle
        }
    );
    let err = rig.ctl.wait_for_run_down(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(scan_error(&err), ScanError::InvalidState { .. }));

    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    let err = rig.ctl.prepare(&standard_range(), &si111()).unwrap_err();
    assert_eq!(
        scan_error(&err),
        &ScanError::InvalidState {
            op: "prepare",
            phase: ScanPhase::Prepared
        }
    );
}

#[test]
fn prepare_failure_stays_idle() {
    let log = CallLog::new();
    let mut motor = RecordingMotor::new(log.clone(), 15.0);
    motor.fail_move = true;
    let trigger = RecordingTrigger::new(log.clone());
    let mut rig = rig_with(motor, trigger, log);

    let err = rig.ctl.prepare(&standard_range(), &si111()).unwrap_err();
    assert!(matches!(
        scan_error(&err),
        ScanError::PrepareFailed {
            step: "move_async(run_up)",
            ..
        }
    ));
    assert_eq!(rig.ctl.phase(), ScanPhase::Idle);
    assert!(rig.ctl.plan().is_none());

    let calls = rig.log.calls();
    assert!(matches!(calls[calls.len() - 3], Call::MoveAsync(_)));
    assert_eq!(calls[calls.len() - 2..], [Call::Disarm, Call::SetSpeed(MAX_SPEED)]);
}

#[test]
fn prepare_failure_disarms_a_module_left_armed() {
    let log = CallLog::new();
    let mut motor = RecordingMotor::new(log.clone(), 15.0);
    motor.fail_set_speed = true;
    let trigger = RecordingTrigger::new(log.clone()).pre_armed();
    let mut rig = rig_with(motor, trigger, log);

    let err = rig.ctl.prepare(&standard_range(), &si111()).unwrap_err();
    assert!(matches!(
        scan_error(&err),
        ScanError::PrepareFailed {
            step: "set_speed(max)",
            ..
        }
    ));
    // The failed set_speed, then one cleanup attempt of each command.
    assert_eq!(
        rig.log.calls(),
        vec![
            Call::SetSpeed(MAX_SPEED),
            Call::Disarm,
            Call::SetSpeed(MAX_SPEED),
        ]
    );
    assert!(!rig.trigger.armed());
    assert_eq!(rig.ctl.phase(), ScanPhase::Idle);
}

#[rstest]
fn cancel_before_prepare_touches_no_hardware(mut rig: Rig) {
    rig.ctl.cancel_handle().store(true, Ordering::Relaxed);
    let err = rig.ctl.prepare(&standard_range(), &si111()).unwrap_err();
    assert_eq!(
        scan_error(&err),
        &ScanError::PrepareFailed {
            step: "prepare",
            cause: HardwareFault::Cancelled
        }
    );
    assert!(rig.log.calls().is_empty());
    assert_eq!(rig.ctl.phase(), ScanPhase::Idle);

    // The request is consumed; the next scan runs.
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.execute().unwrap();
}

#[test]
fn disabled_run_up_and_run_down_sweep_between_scan_edges() {
    let log = CallLog::new();
    let motor = RecordingMotor::new(log.clone(), 15.0);
    let trigger = RecordingTrigger::new(log.clone());
    let clock = ManualClock::new();
    let positioning = PositioningCfg {
        use_run_up: false,
        use_run_down: false,
        ..PositioningCfg::default()
    };
    let mut ctl = build_controller(
        motor.clone(),
        trigger,
        MotionCfg::default(),
        positioning,
        Timeouts::default(),
        Some(Arc::new(clock) as Arc<dyn Clock + Send + Sync>),
    )
    .expect("valid config");

    let plan = ctl.prepare(&standard_range(), &si111()).unwrap();
    assert!(plan.run_up_margin > 0.0);
    ctl.execute().unwrap();
    ctl.wait_for_run_down(Duration::from_secs(1)).unwrap();
    ctl.complete().unwrap();

    let moves: Vec<Call> = log
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::MoveAsync(_)))
        .collect();
    assert_eq!(
        moves,
        vec![Call::MoveAsync(plan.start_angle), Call::MoveAsync(plan.end_angle)]
    );
    assert_eq!(motor.position(), plan.end_angle);
    assert_eq!(ctl.phase(), ScanPhase::Completed);
}

#[test]
fn stuck_axis_times_out_and_cleans_up() {
    let log = CallLog::new();
    let mut motor = RecordingMotor::new(log.clone(), 15.0);
    motor.stuck = true;
    let trigger = RecordingTrigger::new(log.clone());
    let mut rig = rig_with(motor, trigger, log);

    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    let err = rig.ctl.execute().unwrap_err();
    assert_eq!(
        scan_error(&err),
        &ScanError::ExecuteFailed {
            step: "in_position",
            cause: HardwareFault::Timeout
        }
    );
    assert!(rig.clock.elapsed() >= Duration::from_secs(1));
    assert!(!rig.log.calls().contains(&Call::Arm));
    assert_eq!(rig.log.calls().last(), Some(&Call::SetSpeed(MAX_SPEED)));
    assert_eq!(rig.ctl.phase(), ScanPhase::Aborted);
}

#[rstest]
fn cancel_flag_aborts_the_settle_wait(mut rig: Rig) {
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.cancel_handle().store(true, Ordering::Relaxed);
    let err = rig.ctl.execute().unwrap_err();
    assert_eq!(
        scan_error(&err),
        &ScanError::ExecuteFailed {
            step: "in_position",
            cause: HardwareFault::Cancelled
        }
    );

    // The abort's cleanup cleared the flag.
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.execute().unwrap();
}

#[test]
fn settle_wait_polls_on_the_clock() {
    let log = CallLog::new();
    let motor = RecordingMotor::new(log.clone(), 15.0).with_busy_polls(3);
    let trigger = RecordingTrigger::new(log.clone());
    let mut rig = rig_with(motor, trigger, log);

    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.execute().unwrap();
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(60));
}

#[test]
fn cleanup_failure_is_reported_after_trying_both() {
    let log = CallLog::new();
    let motor = RecordingMotor::new(log.clone(), 15.0);
    let mut trigger = RecordingTrigger::new(log.clone());
    trigger.fail_disarm = true;
    let mut rig = rig_with(motor, trigger, log);

    let err = rig.ctl.complete().unwrap_err();
    assert!(matches!(scan_error(&err), ScanError::CleanupFailed(m) if m.contains("disarm")));
    assert_eq!(rig.log.calls(), vec![Call::Disarm, Call::SetSpeed(MAX_SPEED)]);
}

#[rstest]
fn abort_forces_aborted(mut rig: Rig) {
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.execute().unwrap();
    rig.ctl.abort().unwrap();
    assert_eq!(rig.ctl.phase(), ScanPhase::Aborted);
    assert!(!rig.trigger.armed());
    // Aborted is a resting state.
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
}

#[test]
fn dropping_a_running_controller_disarms() {
    let log = CallLog::new();
    let motor = RecordingMotor::new(log.clone(), 15.0);
    let trigger = RecordingTrigger::new(log.clone());
    let mut rig = rig_with(motor, trigger, log);
    rig.ctl.prepare(&standard_range(), &si111()).unwrap();
    rig.ctl.execute().unwrap();
    assert!(rig.trigger.armed());
    let Rig { trigger, ctl, .. } = rig;
    drop(ctl);
    assert!(!trigger.armed());
}
