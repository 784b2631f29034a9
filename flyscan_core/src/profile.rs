//! Constant-velocity motion plan for one fly scan.
//!
//! Energies are converted to Bragg angles, and the scan speed and step are
//! derived from `start_angle - end_angle` without assuming which angle is
//! larger. The run-up margin is the distance needed to reach scan speed
//! (scaled up for safety). It is applied "outward" at both ends so the
//! gated region is crossed at constant velocity.

use crate::bragg;
use crate::config::RunUpCfg;
use crate::error::ScanError;
use crate::types::{CrystalGeometry, EnergyRange};

/// Which way the Bragg angle travels during the gated sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionDirection {
    Increasing,
    Decreasing,
    /// Zero-width scan: a single-point acquisition.
    Stationary,
}

/// Angles in degrees, speed in deg/s. `step_angle` and `angular_speed` are
/// signed: positive when the angle decreases during the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPlan {
    pub start_angle: f64,
    pub end_angle: f64,
    pub step_angle: f64,
    pub angular_speed: f64,
    pub run_up_margin: f64,
    pub run_up_position: f64,
    pub run_down_position: f64,
}

impl MotionPlan {
    /// Speed magnitude to command on the actuator.
    #[inline]
    pub fn speed(&self) -> f64 {
        self.angular_speed.abs()
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.start_angle == self.end_angle
    }

    pub fn direction(&self) -> MotionDirection {
        if self.is_degenerate() {
            MotionDirection::Stationary
        } else if self.end_angle > self.start_angle {
            MotionDirection::Increasing
        } else {
            MotionDirection::Decreasing
        }
    }

    /// Photon energy tagged to frame `index`.
    ///
    /// The frame is taken at `start - (index + frame_offset) * step`; an
    /// offset of 0.5 reports the midpoint of each gate interval.
    pub fn energy_at_frame(
        &self,
        index: usize,
        geometry: &CrystalGeometry,
        frame_offset: f64,
    ) -> Result<f64, ScanError> {
        #[allow(clippy::cast_precision_loss)]
        let position = (index as f64) + frame_offset;
        let angle = self.start_angle - position * self.step_angle;
        bragg::energy_from_angle(angle, geometry.d_spacing)
    }
}

/// Move `edge` away from `opposite` by `margin`.
///
/// This is the single place that decides which way "outward" is. Ties
/// extend upward, which only matters for a zero margin.
#[inline]
pub fn extend_outward(edge: f64, opposite: f64, margin: f64) -> f64 {
    if edge >= opposite {
        edge + margin
    } else {
        edge - margin
    }
}

pub struct MotionProfile;

impl MotionProfile {
    /// Plan with the plain `scale * v² / (2 a)` run-up.
    pub fn compute(
        range: &EnergyRange,
        geometry: &CrystalGeometry,
        acceleration: f64,
        scale_factor: f64,
    ) -> Result<MotionPlan, ScanError> {
        let cfg = RunUpCfg {
            acceleration,
            scale_factor,
            min_run_up_steps: 0.0,
            extra_run_up_deg: 0.0,
        };
        Self::compute_with(range, geometry, &cfg)
    }

    pub fn compute_with(
        range: &EnergyRange,
        geometry: &CrystalGeometry,
        cfg: &RunUpCfg,
    ) -> Result<MotionPlan, ScanError> {
        validate_request(range, cfg)?;

        let start_angle = bragg::angle_from_energy(range.start, geometry.d_spacing)?;
        let end_angle = bragg::angle_from_energy(range.end, geometry.d_spacing)?;
        let span = start_angle - end_angle;

        let (step_angle, angular_speed, run_up_margin) = if span == 0.0 {
            (0.0, 0.0, 0.0)
        } else {
            let step = span / f64::from(range.point_count);
            let speed = span / range.total_time;
            (step, speed, run_up_margin(speed, step, cfg))
        };

        let run_up_position = extend_outward(start_angle, end_angle, run_up_margin);
        let run_down_position = extend_outward(end_angle, start_angle, run_up_margin);
        for (label, angle) in [("run-up", run_up_position), ("run-down", run_down_position)] {
            if !(angle > 0.0 && angle < 90.0) {
                return Err(ScanError::OutOfRange(format!(
                    "{label} position {angle:.5}° leaves the (0°, 90°) Bragg range"
                )));
            }
        }

        let plan = MotionPlan {
            start_angle,
            end_angle,
            step_angle,
            angular_speed,
            run_up_margin,
            run_up_position,
            run_down_position,
        };
        tracing::debug!(
            start = plan.start_angle,
            end = plan.end_angle,
            step = plan.step_angle,
            speed = plan.angular_speed,
            margin = plan.run_up_margin,
            "motion plan computed"
        );
        Ok(plan)
    }
}

fn run_up_margin(speed: f64, step: f64, cfg: &RunUpCfg) -> f64 {
    let ideal = cfg.scale_factor * speed * speed / (2.0 * cfg.acceleration);
    let floor = cfg.min_run_up_steps * step.abs();
    ideal.max(floor) + cfg.extra_run_up_deg
}

fn validate_request(range: &EnergyRange, cfg: &RunUpCfg) -> Result<(), ScanError> {
    let invalid = |msg: String| Err(ScanError::InvalidScanRequest(msg));
    if range.point_count == 0 {
        return invalid("point count must be > 0".into());
    }
    if !(range.total_time.is_finite() && range.total_time > 0.0) {
        return invalid(format!("total time must be > 0 s, got {}", range.total_time));
    }
    if !(range.start.is_finite() && range.end.is_finite()) {
        return invalid("energy bounds must be finite".into());
    }
    if !(cfg.acceleration.is_finite() && cfg.acceleration > 0.0) {
        return invalid(format!(
            "acceleration must be > 0 deg/s², got {}",
            cfg.acceleration
        ));
    }
    if !(cfg.scale_factor.is_finite() && cfg.scale_factor >= 1.0) {
        return invalid(format!(
            "run-up scale factor must be >= 1.0, got {}",
            cfg.scale_factor
        ));
    }
    if !(cfg.min_run_up_steps.is_finite() && cfg.min_run_up_steps >= 0.0) {
        return invalid("min run-up steps must be >= 0".into());
    }
    if !(cfg.extra_run_up_deg.is_finite() && cfg.extra_run_up_deg >= 0.0) {
        return invalid("extra run-up must be >= 0°".into());
    }
    Ok(())
}
