//! Position-compare gate derived from a motion plan.

use crate::profile::MotionPlan;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Encoder angle where pulsing begins, degrees.
    pub start: f64,
    /// Gated travel, always non-negative.
    pub width: f64,
    /// Travel between pulses. Zero for a single-point scan.
    pub step: f64,
}

impl GateConfig {
    pub fn from_plan(plan: &MotionPlan, point_count: u32) -> Self {
        let width = (plan.end_angle - plan.start_angle).abs();
        let step = if width == 0.0 || point_count == 0 {
            0.0
        } else {
            width / f64::from(point_count)
        };
        Self {
            start: plan.start_angle,
            width,
            step,
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.step == 0.0
    }

    /// Pulses the module emits across the gate; one for a degenerate gate.
    pub fn pulse_count(&self) -> u32 {
        if self.is_degenerate() {
            return 1;
        }
        let n = (self.width / self.step).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = n.clamp(1.0, f64::from(u32::MAX)) as u32;
        n
    }
}
