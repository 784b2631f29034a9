//! `From` implementations bridging `flyscan_config` types to `flyscan_core` types.

use std::time::Duration;

use crate::config::{MotionCfg, PositioningCfg, RunUpCfg, Timeouts};
use crate::types::CrystalGeometry;

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&flyscan_config::Motion> for RunUpCfg {
    fn from(c: &flyscan_config::Motion) -> Self {
        Self {
            acceleration: c.acceleration_deg_s2,
            scale_factor: c.run_up_scale,
            min_run_up_steps: c.min_run_up_steps,
            extra_run_up_deg: c.extra_run_up_deg,
        }
    }
}

impl From<&flyscan_config::Motion> for MotionCfg {
    fn from(c: &flyscan_config::Motion) -> Self {
        Self {
            max_speed: c.max_speed_deg_s,
            run_up: RunUpCfg::from(c),
        }
    }
}

// ── PositioningCfg ───────────────────────────────────────────────────────────

impl From<&flyscan_config::Positioning> for PositioningCfg {
    fn from(c: &flyscan_config::Positioning) -> Self {
        Self {
            wait_for_run_up: c.wait_for_run_up,
            use_run_up: c.run_up,
            use_run_down: c.run_down,
            demand_tolerance: c.demand_tolerance_deg,
            poll_interval: Duration::from_millis(c.poll_ms),
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&flyscan_config::Timeouts> for Timeouts {
    fn from(c: &flyscan_config::Timeouts) -> Self {
        Self {
            in_position: Duration::from_millis(c.in_position_ms),
            run_down: Duration::from_millis(c.run_down_ms),
        }
    }
}

// ── CrystalGeometry ──────────────────────────────────────────────────────────

impl TryFrom<&flyscan_config::Crystal> for CrystalGeometry {
    type Error = eyre::Report;
    fn try_from(c: &flyscan_config::Crystal) -> Result<Self, Self::Error> {
        c.d_spacing().map(Self::new)
    }
}
