use std::time::Duration;

use flyscan_hardware::SimulatedBeamline;
use flyscan_traits::{BufferedDetector, FrameRangeError, ManualClock, Motor, TriggerModule};
use rstest::rstest;

fn sweep(points: u32) -> SimulatedBeamline<ManualClock> {
    let clock = ManualClock::new();
    let mut bl = SimulatedBeamline::new(11.5, 3, 1.0, clock.clone());
    let step = 1.0 / f64::from(points);
    bl.trigger.set_gate_start(11.0).unwrap();
    bl.trigger.set_gate_width(1.0).unwrap();
    bl.trigger.set_gate_step(step).unwrap();
    bl.trigger.arm().unwrap();
    bl.motor.set_speed(1.0).unwrap();
    bl.motor.move_async(9.5).unwrap();
    clock.advance(Duration::from_secs(3));
    bl
}

#[rstest]
#[case(1)]
#[case(10)]
#[case(250)]
fn detector_buffers_one_frame_per_point(#[case] points: u32) {
    let mut bl = sweep(points);
    assert_eq!(
        bl.detector.number_of_frames_available().unwrap(),
        points as usize
    );
}

#[test]
fn frames_are_frame_major() {
    let mut bl = sweep(10);
    let frames = bl.detector.read_frames(2, 5).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], vec![1020.0, 1021.0, 1022.0]);
}

#[test]
fn over_read_reports_available() {
    let mut bl = sweep(10);
    let err = bl.detector.read_frames(5, 12).unwrap_err();
    let range = err
        .downcast_ref::<FrameRangeError>()
        .expect("frame range error");
    assert_eq!(
        *range,
        FrameRangeError {
            start: 5,
            end: 12,
            available: 10
        }
    );
    assert!(bl.detector.read_frames(6, 4).is_err());
}

#[test]
fn new_gate_clears_the_buffer() {
    let mut bl = sweep(10);
    bl.trigger.disarm().unwrap();
    bl.trigger.set_gate_start(9.5).unwrap();
    assert_eq!(bl.detector.number_of_frames_available().unwrap(), 0);
}

#[test]
fn soft_limits_reject_moves_and_keep_the_target() {
    let bl = SimulatedBeamline::new(11.5, 2, 1.0, ManualClock::new());
    let mut motor = bl.motor.clone().with_limits(5.0, 20.0);
    assert!(motor.move_async(25.0).is_err());
    assert_eq!(motor.target(), 11.5);
    motor.move_async(12.0).unwrap();
    assert_eq!(bl.motor.target(), 12.0);
    assert_eq!(bl.detector.channels(), 2);
}
