use flyscan_core::bragg::{angle_from_energy, energy_from_angle, min_energy};
use flyscan_core::{CrystalGeometry, EnergyRange, GateConfig, MotionProfile, ScanError};
use proptest::prelude::*;

const SI111: f64 = 3.13555;
const SI311: f64 = 1.635;

fn d_spacing() -> impl Strategy<Value = f64> {
    prop_oneof![Just(SI111), Just(SI311), 1.0f64..6.0]
}

proptest! {
    #[test]
    fn energy_round_trips_through_angle(d in d_spacing(), factor in 1.0001f64..50.0) {
        let e = min_energy(d) * factor;
        let angle = angle_from_energy(e, d).unwrap();
        prop_assert!(angle > 0.0 && angle < 90.0);
        let back = energy_from_angle(angle, d).unwrap();
        prop_assert!((back - e).abs() < 1e-6, "e={} back={}", e, back);
    }

    #[test]
    fn energies_below_the_edge_have_no_angle(d in d_spacing(), factor in 0.01f64..0.9999) {
        let e = min_energy(d) * factor;
        prop_assert!(matches!(angle_from_energy(e, d), Err(ScanError::OutOfRange(_))));
    }

    #[test]
    fn plan_is_self_consistent(
        start in 6_000.0f64..20_000.0,
        end in 6_000.0f64..20_000.0,
        points in 1u32..5_000,
        total_time in 2.0f64..200.0,
        acceleration in 0.2f64..5.0,
        scale in 1.0f64..4.0,
    ) {
        let range = EnergyRange::new(start, end, points, total_time);
        let geom = CrystalGeometry::new(SI111);
        let plan = match MotionProfile::compute(&range, &geom, acceleration, scale) {
            Ok(plan) => plan,
            // Only a run-up past the physical range may fail here.
            Err(ScanError::OutOfRange(_)) => return Ok(()),
            Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other}"))),
        };

        let span = plan.start_angle - plan.end_angle;
        prop_assert!((plan.angular_speed - span / total_time).abs() < 1e-12);
        prop_assert!((plan.step_angle - span / f64::from(points)).abs() < 1e-12);

        let margin = scale * plan.angular_speed.powi(2) / (2.0 * acceleration);
        prop_assert!((plan.run_up_margin - margin).abs() < 1e-12);

        // Run-up and run-down lie outside the scanned interval.
        prop_assert!((plan.run_up_position - plan.start_angle) * span >= 0.0);
        prop_assert!((plan.end_angle - plan.run_down_position) * span >= 0.0);
        prop_assert!(((plan.run_up_position - plan.start_angle).abs() - margin).abs() < 1e-9);

        let gate = GateConfig::from_plan(&plan, points);
        prop_assert_eq!(gate.start, plan.start_angle);
        prop_assert!((gate.width - span.abs()).abs() < 1e-12);
        if gate.width > 0.0 {
            prop_assert!((gate.step - gate.width / f64::from(points)).abs() < 1e-12);
            prop_assert_eq!(gate.pulse_count(), points);
        }
    }
}

#[test]
fn reference_gate_parameters() {
    let geom = CrystalGeometry::new(SI111);
    let range = EnergyRange::new(10_000.0, 12_000.0, 1000, 5.0);
    let plan = MotionProfile::compute(&range, &geom, 0.225, 3.0).unwrap();
    let gate = GateConfig::from_plan(&plan, 1000);

    let a10 = angle_from_energy(10_000.0, SI111).unwrap();
    let a12 = angle_from_energy(12_000.0, SI111).unwrap();
    assert_eq!(gate.start, a10);
    assert!((gate.width - (a12 - a10).abs()).abs() < 1e-12);
    assert!((gate.step - gate.width / 1000.0).abs() < 1e-15);

    let speed = (a10 - a12) / 5.0;
    let margin = 3.0 * speed * speed / (2.0 * 0.225);
    assert!((plan.run_up_margin - margin).abs() < 1e-12);
    // Energy rises, so the angle falls: run-up sits above the start angle.
    assert!((plan.run_up_position - (a10 + margin)).abs() < 1e-12);
    assert!((plan.run_down_position - (a12 - margin)).abs() < 1e-12);
}

#[test]
fn bad_motion_parameters_are_invalid_requests() {
    let geom = CrystalGeometry::new(SI111);
    let range = EnergyRange::new(10_000.0, 12_000.0, 1000, 5.0);
    for (a, s) in [(0.0, 3.0), (-1.0, 3.0), (0.225, 0.5), (f64::NAN, 3.0)] {
        assert!(matches!(
            MotionProfile::compute(&range, &geom, a, s),
            Err(ScanError::InvalidScanRequest(_))
        ));
    }
}
