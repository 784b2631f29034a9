//! Subcommand bodies: plan, convert, scan and self-check.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use eyre::{Report, Result, WrapErr};
use flyscan_config::Config;
use flyscan_core::frames::{frames_available, read_frames, tag_frames};
use flyscan_core::monitor::MotionMonitor;
use flyscan_core::runner::{RunOptions, run_scan};
use flyscan_core::{
    CrystalGeometry, EnergyRange, FlyScan, GateConfig, MotionCfg, MotionPlan, MotionProfile,
    PositioningCfg, Timeouts, bragg,
};
use flyscan_hardware::util::wait_until_idle;
use flyscan_hardware::{MotorFault, SimulatedBeamline};
use flyscan_traits::{MonotonicClock, Motor, TriggerModule};
use serde_json::json;

use crate::cli::RangeArgs;

/// Fault injected into the simulated beamline, for CLI integration tests.
const SIM_FAULT_ENV: &str = "FLYSCAN_TEST_SIM_FAULT";

impl From<RangeArgs> for EnergyRange {
    fn from(r: RangeArgs) -> Self {
        EnergyRange::new(r.start, r.end, r.points, r.time)
    }
}

pub fn print_plan(
    cfg: &Config,
    geometry: &CrystalGeometry,
    range: &RangeArgs,
    json_out: bool,
) -> Result<()> {
    let motion: MotionCfg = (&cfg.motion).into();
    let range = EnergyRange::from(*range);
    let plan =
        MotionProfile::compute_with(&range, geometry, &motion.run_up).map_err(Report::new)?;
    let gate = GateConfig::from_plan(&plan, range.point_count);
    let within_limit = plan.speed() <= motion.max_speed;
    if !within_limit {
        tracing::warn!(
            speed = plan.speed(),
            max_speed = motion.max_speed,
            "scan speed exceeds the configured maximum; scan would be rejected"
        );
    }

    if json_out {
        println!(
            "{}",
            json!({
                "d_spacing_angstrom": geometry.d_spacing,
                "start_angle_deg": plan.start_angle,
                "end_angle_deg": plan.end_angle,
                "step_angle_deg": plan.step_angle,
                "angular_speed_deg_s": plan.angular_speed,
                "run_up_margin_deg": plan.run_up_margin,
                "run_up_position_deg": plan.run_up_position,
                "run_down_position_deg": plan.run_down_position,
                "gate": { "start": gate.start, "width": gate.width, "step": gate.step },
                "pulses": gate.pulse_count(),
                "within_speed_limit": within_limit,
            })
        );
        return Ok(());
    }

    println!("d-spacing:          {:.5} Å", geometry.d_spacing);
    println!("start angle:        {:.6}°", plan.start_angle);
    println!("end angle:          {:.6}°", plan.end_angle);
    println!("step:               {:.8}°", plan.step_angle);
    println!("speed:              {:.6}°/s", plan.angular_speed);
    println!("run-up margin:      {:.6}°", plan.run_up_margin);
    println!("run-up position:    {:.6}°", plan.run_up_position);
    println!("run-down position:  {:.6}°", plan.run_down_position);
    println!(
        "gate:               start {:.6}° width {:.6}° step {:.8}° ({} pulses)",
        gate.start,
        gate.width,
        gate.step,
        gate.pulse_count()
    );
    if !within_limit {
        println!(
            "warning:            speed exceeds motion.max_speed_deg_s ({})",
            motion.max_speed
        );
    }
    Ok(())
}

pub fn convert(
    geometry: &CrystalGeometry,
    energy: Option<f64>,
    angle: Option<f64>,
    json_out: bool,
) -> Result<()> {
    let (energy_ev, angle_deg) = match (energy, angle) {
        (Some(e), _) => {
            let a = bragg::angle_from_energy(e, geometry.d_spacing).map_err(Report::new)?;
            (e, a)
        }
        (None, Some(a)) => {
            let e = bragg::energy_from_angle(a, geometry.d_spacing).map_err(Report::new)?;
            (e, a)
        }
        (None, None) => eyre::bail!("convert needs --energy or --angle"),
    };
    if json_out {
        println!(
            "{}",
            json!({
                "energy_ev": energy_ev,
                "angle_deg": angle_deg,
                "d_spacing_angstrom": geometry.d_spacing,
            })
        );
    } else {
        println!(
            "{energy_ev:.3} eV = {angle_deg:.6}° (d = {:.5} Å)",
            geometry.d_spacing
        );
    }
    Ok(())
}

fn sim_beamline(cfg: &Config) -> Result<SimulatedBeamline<MonotonicClock>> {
    let bl = SimulatedBeamline::new(
        cfg.simulation.start_angle_deg,
        cfg.detector.channels,
        cfg.simulation.speed_scale,
        MonotonicClock::new(),
    );
    if let Ok(fault) = std::env::var(SIM_FAULT_ENV) {
        match fault.as_str() {
            "jam" => bl.motor.inject(MotorFault::Jammed),
            "reject" => bl.motor.inject(MotorFault::RejectMoves),
            "readback-timeout" => bl.motor.inject(MotorFault::ReadbackTimeout),
            "arm" => bl.trigger.fail_arm(true),
            other => eyre::bail!("{SIM_FAULT_ENV}: unknown fault '{other}'"),
        }
        tracing::warn!(fault = %fault, "simulated fault injected");
    }
    Ok(bl)
}

/// Fraction of the sweep covered at `position`, clamped to [0, 1].
pub fn progress_fraction(plan: &MotionPlan, position: f64) -> f64 {
    let total = plan.run_down_position - plan.run_up_position;
    if total == 0.0 {
        return 1.0;
    }
    ((position - plan.run_up_position) / total).clamp(0.0, 1.0)
}

pub fn render_progress_bar(fraction: f64, width: usize) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn spawn_progress(
    monitor: MotionMonitor,
    plan: MotionPlan,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut shown = false;
        while !stop.load(Ordering::Relaxed) {
            if let Some(s) = monitor.latest() {
                let frac = progress_fraction(&plan, s.position);
                eprint!(
                    "\r{} {:5.1}%  θ = {:.5}°",
                    render_progress_bar(frac, 30),
                    frac * 100.0,
                    s.position
                );
                let _ = std::io::stderr().flush();
                shown = true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        if shown {
            eprintln!();
        }
    })
}

pub fn run_sim_scan(
    cfg: &Config,
    geometry: &CrystalGeometry,
    range: &RangeArgs,
    print_frames: bool,
    progress: bool,
    json_out: bool,
) -> Result<()> {
    let range = EnergyRange::from(*range);
    let mut bl = sim_beamline(cfg)?;
    let motion: MotionCfg = (&cfg.motion).into();
    let positioning: PositioningCfg = (&cfg.positioning).into();
    let timeouts: Timeouts = (&cfg.timeouts).into();

    let mut controller = FlyScan::builder()
        .with_motor(bl.motor.clone())
        .with_trigger(bl.trigger.clone())
        .with_motion(motion)
        .with_positioning(positioning)
        .with_timeouts(timeouts)
        .with_clock(MonotonicClock::new())
        .build()?;

    let cancel = controller.cancel_handle();
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::Relaxed);
    })
    .wrap_err("install Ctrl-C handler")?;

    // Progress needs the plan up front; the controller recomputes the same one.
    let reporter = if progress && !json_out {
        match MotionProfile::compute_with(&range, geometry, &motion.run_up) {
            Ok(plan) => {
                let monitor = MotionMonitor::spawn(
                    bl.motor.clone(),
                    cfg.simulation.monitor_hz,
                    MonotonicClock::new(),
                );
                let stop = Arc::new(AtomicBool::new(false));
                Some((spawn_progress(monitor, plan, stop.clone()), stop))
            }
            Err(_) => None,
        }
    } else {
        None
    };

    let result = run_scan(&mut controller, &range, geometry, &RunOptions::default());

    if let Some((handle, stop)) = reporter {
        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
    }
    let outcome = result?;

    let available = frames_available(&mut bl.detector).map_err(Report::new)?;
    let expected = outcome.gate.pulse_count() as usize;
    if available != expected {
        tracing::warn!(available, expected, "detector frame count differs from gate pulses");
    }
    let frames = read_frames(&mut bl.detector, 0, available).map_err(Report::new)?;
    let tagged = tag_frames(frames, 0, &outcome.plan, geometry, cfg.detector.frame_offset)
        .map_err(Report::new)?;

    if json_out {
        println!(
            "{}",
            json!({
                "event": "scan_complete",
                "frames": tagged.len(),
                "elapsed_ms": outcome.elapsed_ms,
                "start_ev": range.start,
                "end_ev": range.end,
                "run_up_position_deg": outcome.plan.run_up_position,
                "run_down_position_deg": outcome.plan.run_down_position,
            })
        );
        if print_frames {
            for f in &tagged {
                println!(
                    "{}",
                    json!({ "index": f.index, "energy_ev": f.energy_ev, "channels": f.channels })
                );
            }
        }
    } else {
        if print_frames {
            for f in &tagged {
                let channels: Vec<String> = f.channels.iter().map(|c| format!("{c:.1}")).collect();
                println!("{}\t{:.3}\t{}", f.index, f.energy_ev, channels.join("\t"));
            }
        }
        println!(
            "scan complete: {} frames, {:.3} -> {:.3} eV in {:.3} s",
            tagged.len(),
            range.start,
            range.end,
            outcome.elapsed_ms as f64 / 1000.0
        );
    }
    Ok(())
}

/// Nudge the simulated actuator, wait for it to settle and cycle the trigger.
pub fn self_check(cfg: &Config, json_out: bool) -> Result<()> {
    let mut bl = sim_beamline(cfg)?;
    let clock = MonotonicClock::new();
    let start = bl.motor.position();
    let target = if start + 0.01 < 90.0 { start + 0.01 } else { start - 0.01 };

    let mut motor = bl.motor.clone();
    motor
        .set_speed(cfg.motion.max_speed_deg_s)
        .map_err(|e| eyre::eyre!("motor set_speed: {e}"))?;
    motor
        .move_async(target)
        .map_err(|e| eyre::eyre!("motor move: {e}"))?;
    let settled = wait_until_idle(
        &mut motor,
        &clock,
        Duration::from_millis(cfg.timeouts.in_position_ms),
        Duration::from_millis(cfg.positioning.poll_ms),
    )
    .wrap_err("motor did not settle")?;
    if (settled - target).abs() > cfg.positioning.demand_tolerance_deg {
        eyre::bail!("motor settled at {settled:.6}°, expected {target:.6}°");
    }

    let trigger = &mut bl.trigger;
    trigger.arm().map_err(|e| eyre::eyre!("trigger arm: {e}"))?;
    trigger.disarm().map_err(|e| eyre::eyre!("trigger disarm: {e}"))?;
    let frames = frames_available(&mut bl.detector).map_err(Report::new)?;

    tracing::info!(settled, frames, "self-check ok");
    if json_out {
        println!("{}", json!({ "ok": true, "position_deg": settled, "frames": frames }));
    } else {
        println!("OK");
    }
    Ok(())
}
