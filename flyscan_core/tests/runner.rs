use std::sync::Arc;

use flyscan_core::mocks::{Call, CallLog, RecordingMotor, RecordingTrigger};
use flyscan_core::runner::{RunOptions, run_scan};
use flyscan_core::{
    CrystalGeometry, EnergyRange, MotionCfg, PositioningCfg, ScanError, ScanPhase, Timeouts,
    build_controller,
};
use flyscan_traits::{Clock, ManualClock};

fn controller(
    motor: RecordingMotor,
    trigger: RecordingTrigger,
) -> flyscan_core::FlyScanController<RecordingMotor, RecordingTrigger> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(ManualClock::new());
    build_controller(
        motor,
        trigger,
        MotionCfg::default(),
        PositioningCfg::default(),
        Timeouts::default(),
        Some(clock),
    )
    .unwrap()
}

#[test]
fn successful_scan_ends_disarmed_at_max_speed() {
    let log = CallLog::new();
    let trigger = RecordingTrigger::new(log.clone());
    let mut ctl = controller(RecordingMotor::new(log.clone(), 12.0), trigger.clone());

    let range = EnergyRange::new(10_000.0, 12_000.0, 500, 5.0);
    let outcome = run_scan(
        &mut ctl,
        &range,
        &CrystalGeometry::new(3.13555),
        &RunOptions::default(),
    )
    .unwrap();

    assert_eq!(ctl.phase(), ScanPhase::Completed);
    assert_eq!(outcome.gate.pulse_count(), 500);
    let calls = log.calls();
    assert_eq!(&calls[calls.len() - 2..], &[Call::Disarm, Call::SetSpeed(0.5)]);
    assert!(!trigger.armed());
}

#[test]
fn failed_execute_is_aborted_and_propagated() {
    let log = CallLog::new();
    let mut trigger = RecordingTrigger::new(log.clone());
    trigger.fail_arm = true;
    let mut ctl = controller(RecordingMotor::new(log.clone(), 12.0), trigger);

    let range = EnergyRange::new(10_000.0, 12_000.0, 500, 5.0);
    let err = run_scan(
        &mut ctl,
        &range,
        &CrystalGeometry::new(3.13555),
        &RunOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScanError>(),
        Some(ScanError::ExecuteFailed { step: "arm", .. })
    ));
    assert_eq!(ctl.phase(), ScanPhase::Aborted);
}

#[test]
fn invalid_request_is_returned_untouched() {
    let log = CallLog::new();
    let mut ctl = controller(
        RecordingMotor::new(log.clone(), 12.0),
        RecordingTrigger::new(log.clone()),
    );
    let range = EnergyRange::new(10_000.0, 12_000.0, 0, 5.0);
    let err = run_scan(
        &mut ctl,
        &range,
        &CrystalGeometry::new(3.13555),
        &RunOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScanError>(),
        Some(ScanError::InvalidScanRequest(_))
    ));
    assert!(log.calls().is_empty());
    assert_eq!(ctl.phase(), ScanPhase::Idle);
}

#[test]
fn no_wait_leaves_completion_to_the_caller() {
    let log = CallLog::new();
    let mut ctl = controller(
        RecordingMotor::new(log.clone(), 12.0),
        RecordingTrigger::new(log.clone()),
    );
    let range = EnergyRange::new(10_000.0, 12_000.0, 10, 5.0);
    let opts = RunOptions {
        wait_for_run_down: false,
        run_down_timeout: None,
    };
    run_scan(&mut ctl, &range, &CrystalGeometry::new(3.13555), &opts).unwrap();
    assert_eq!(ctl.phase(), ScanPhase::Running);
    ctl.wait_for_run_down(ctl.timeouts().run_down).unwrap();
    ctl.complete().unwrap();
    assert_eq!(ctl.phase(), ScanPhase::Completed);
}
