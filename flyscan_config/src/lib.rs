#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and crystal table parsing for the fly-scan controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; defaults describe a Si(111) monochromator.
//! - The crystal table CSV loader enforces headers and rejects duplicates.
use std::path::Path;

use serde::Deserialize;

/// Built-in lattice spacings, ångström.
pub const CRYSTAL_PRESETS: &[(&str, f64)] = &[("Si(111)", 3.135_55), ("Si(311)", 1.635)];

fn normalize_crystal_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Look up a preset by name. `Si111`, `si(111)` and `Si(111)` are the same crystal.
pub fn preset_d_spacing(name: &str) -> Option<f64> {
    let wanted = normalize_crystal_name(name);
    CRYSTAL_PRESETS
        .iter()
        .find(|(n, _)| normalize_crystal_name(n) == wanted)
        .map(|(_, d)| *d)
}

/// Crystal table CSV schema.
///
/// Expected headers:
/// crystal,d_spacing_angstrom
///
/// Example:
/// crystal,d_spacing_angstrom
/// Si(111),3.13555
/// Ge(111),3.26627
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CrystalRow {
    pub crystal: String,
    pub d_spacing_angstrom: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Crystal {
    /// Preset or table entry name. Ignored when `d_spacing_angstrom` is set.
    pub name: Option<String>,
    pub d_spacing_angstrom: Option<f64>,
    /// Optional CSV table searched for `name` before the presets.
    pub table: Option<String>,
}

impl Default for Crystal {
    fn default() -> Self {
        Self {
            name: Some("Si(111)".to_string()),
            d_spacing_angstrom: None,
            table: None,
        }
    }
}

impl Crystal {
    /// Resolve the lattice spacing: explicit value, then table, then presets.
    pub fn d_spacing(&self) -> eyre::Result<f64> {
        if let Some(d) = self.d_spacing_angstrom {
            return Ok(d);
        }
        let Some(name) = self.name.as_deref() else {
            eyre::bail!("crystal needs either name or d_spacing_angstrom");
        };
        if let Some(table) = self.table.as_deref() {
            let rows = load_crystal_csv(Path::new(table))?;
            let wanted = normalize_crystal_name(name);
            if let Some(row) = rows
                .iter()
                .find(|r| normalize_crystal_name(&r.crystal) == wanted)
            {
                return Ok(row.d_spacing_angstrom);
            }
        }
        preset_d_spacing(name).ok_or_else(|| eyre::eyre!("unknown crystal '{name}'"))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Motion {
    pub acceleration_deg_s2: f64,
    /// Speed for positioning moves and the speed restored after a scan.
    pub max_speed_deg_s: f64,
    /// Safety multiplier on the acceleration distance (>= 1.0)
    pub run_up_scale: f64,
    /// Minimum run-up, in scan steps (0 disables)
    pub min_run_up_steps: f64,
    pub extra_run_up_deg: f64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            acceleration_deg_s2: 0.225,
            max_speed_deg_s: 0.5,
            run_up_scale: 3.0,
            min_run_up_steps: 0.0,
            extra_run_up_deg: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Positioning {
    pub demand_tolerance_deg: f64,
    pub wait_for_run_up: bool,
    /// Move to the run-up position before the sweep, or straight to the start angle
    pub run_up: bool,
    /// Sweep on to the run-down position, or stop at the end angle
    pub run_down: bool,
    /// Poll interval for in-position and run-down waits
    pub poll_ms: u64,
}

impl Default for Positioning {
    fn default() -> Self {
        Self {
            demand_tolerance_deg: 0.000_11,
            wait_for_run_up: true,
            run_up: true,
            run_down: true,
            poll_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timeouts {
    pub in_position_ms: u64,
    pub run_down_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            in_position_ms: 60_000,
            run_down_ms: 600_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Detector {
    pub channels: usize,
    /// Fraction of a step added to the frame index when tagging energies (0.5 = mid-gate)
    pub frame_offset: f64,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            channels: 4,
            frame_offset: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Simulation {
    /// Where the simulated actuator starts, degrees.
    pub start_angle_deg: f64,
    /// Simulated travel per commanded deg/s; > 1 runs scans faster than real time.
    pub speed_scale: f64,
    /// Readback rate for live progress
    pub monitor_hz: u32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            start_angle_deg: 15.0,
            speed_scale: 1.0,
            monitor_hz: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub crystal: Crystal,
    pub motion: Motion,
    pub positioning: Positioning,
    pub timeouts: Timeouts,
    pub detector: Detector,
    pub logging: Logging,
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_crystal_csv(path: &Path) -> eyre::Result<Vec<CrystalRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open crystal CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["crystal", "d_spacing_angstrom"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "crystal CSV must have headers 'crystal,d_spacing_angstrom', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<CrystalRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<CrystalRow>().enumerate() {
        let line = idx + 2;
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", line, e))?;
        if !(row.d_spacing_angstrom.is_finite() && row.d_spacing_angstrom > 0.0) {
            eyre::bail!("row {}: d_spacing_angstrom must be > 0", line);
        }
        let key = normalize_crystal_name(&row.crystal);
        if rows
            .iter()
            .any(|r| normalize_crystal_name(&r.crystal) == key)
        {
            eyre::bail!("row {}: duplicate crystal '{}'", line, row.crystal);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("crystal CSV {:?} has no rows", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Crystal
        match (self.crystal.d_spacing_angstrom, self.crystal.name.as_deref()) {
            (Some(d), _) => {
                if !(d.is_finite() && d > 0.0) {
                    eyre::bail!("crystal.d_spacing_angstrom must be > 0");
                }
            }
            (None, Some(name)) => {
                if self.crystal.table.is_none() && preset_d_spacing(name).is_none() {
                    eyre::bail!(
                        "crystal.name '{}' is not a preset; set d_spacing_angstrom or table",
                        name
                    );
                }
            }
            (None, None) => eyre::bail!("crystal needs either name or d_spacing_angstrom"),
        }

        // Motion
        if !(self.motion.acceleration_deg_s2.is_finite() && self.motion.acceleration_deg_s2 > 0.0)
        {
            eyre::bail!("motion.acceleration_deg_s2 must be > 0");
        }
        if !(self.motion.max_speed_deg_s.is_finite() && self.motion.max_speed_deg_s > 0.0) {
            eyre::bail!("motion.max_speed_deg_s must be > 0");
        }
        if !(self.motion.run_up_scale.is_finite() && self.motion.run_up_scale >= 1.0) {
            eyre::bail!("motion.run_up_scale must be >= 1.0");
        }
        if !(self.motion.min_run_up_steps.is_finite() && self.motion.min_run_up_steps >= 0.0) {
            eyre::bail!("motion.min_run_up_steps must be >= 0");
        }
        if !(self.motion.extra_run_up_deg.is_finite() && self.motion.extra_run_up_deg >= 0.0) {
            eyre::bail!("motion.extra_run_up_deg must be >= 0");
        }

        // Positioning
        if !(self.positioning.demand_tolerance_deg.is_finite()
            && self.positioning.demand_tolerance_deg >= 0.0)
        {
            eyre::bail!("positioning.demand_tolerance_deg must be >= 0");
        }
        if self.positioning.poll_ms == 0 {
            eyre::bail!("positioning.poll_ms must be >= 1");
        }

        // Timeouts
        if self.timeouts.in_position_ms == 0 {
            eyre::bail!("timeouts.in_position_ms must be >= 1");
        }
        if self.timeouts.run_down_ms == 0 {
            eyre::bail!("timeouts.run_down_ms must be >= 1");
        }

        // Detector
        if self.detector.channels == 0 {
            eyre::bail!("detector.channels must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.detector.frame_offset) {
            eyre::bail!("detector.frame_offset must be in [0.0, 1.0]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulation
        if !(self.simulation.start_angle_deg > 0.0 && self.simulation.start_angle_deg < 90.0) {
            eyre::bail!("simulation.start_angle_deg must be in (0, 90)");
        }
        if !(self.simulation.speed_scale.is_finite() && self.simulation.speed_scale > 0.0) {
            eyre::bail!("simulation.speed_scale must be > 0");
        }
        if self.simulation.monitor_hz == 0 {
            eyre::bail!("simulation.monitor_hz must be > 0");
        }

        Ok(())
    }
}
