#![no_main]
use flyscan_core::{CrystalGeometry, EnergyRange, GateConfig, MotionProfile, RunUpCfg};
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Request {
    start: f64,
    end: f64,
    points: u32,
    time: f64,
    d_spacing: f64,
    acceleration: f64,
    scale: f64,
}

fuzz_target!(|r: Request| {
    let range = EnergyRange::new(r.start, r.end, r.points, r.time);
    let geometry = CrystalGeometry::new(r.d_spacing);
    let run_up = RunUpCfg {
        acceleration: r.acceleration,
        scale_factor: r.scale,
        ..RunUpCfg::default()
    };
    let Ok(plan) = MotionProfile::compute_with(&range, &geometry, &run_up) else {
        return;
    };
    // Accepted plans stay inside the physical angle range and are finite.
    assert!(plan.run_up_position > 0.0 && plan.run_up_position < 90.0);
    assert!(plan.run_down_position > 0.0 && plan.run_down_position < 90.0);
    assert!(plan.angular_speed.is_finite() && plan.step_angle.is_finite());
    let gate = GateConfig::from_plan(&plan, r.points);
    assert!(gate.width >= 0.0);
    let _ = gate.pulse_count();
});
