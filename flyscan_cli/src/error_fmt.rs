//! Human-readable error descriptions and structured JSON error formatting.

use flyscan_core::{BuildError, HardwareFault, ScanError};

use crate::cli::LAST_REQUEST;

pub fn scan_error_name(e: &ScanError) -> &'static str {
    match e {
        ScanError::InvalidScanRequest(_) => "InvalidScanRequest",
        ScanError::OutOfRange(_) => "OutOfRange",
        ScanError::InvalidState { .. } => "InvalidState",
        ScanError::PrepareFailed { .. } => "PrepareFailed",
        ScanError::ExecuteFailed { .. } => "ExecuteFailed",
        ScanError::CleanupFailed(_) => "CleanupFailed",
        ScanError::FrameRange { .. } => "FrameRange",
        ScanError::Detector(_) => "Detector",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingMotor => {
                "What happened: No motor was provided to the scan controller.\nLikely causes: The actuator driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the motor is created successfully and passed via with_motor(...).".to_string()
            }
            BuildError::MissingTrigger => {
                "What happened: No trigger module was provided to the scan controller.\nLikely causes: The position-compare module failed to initialize or was not wired into the builder.\nHow to fix: Ensure the trigger module is created and passed via with_trigger(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScanError>() {
        return match se {
            ScanError::InvalidScanRequest(why) => format!(
                "What happened: The scan request was rejected ({why}).\nLikely causes: Zero points, a non-positive time, or a sweep faster than motion.max_speed_deg_s.\nHow to fix: Use at least one point and a longer --time, or raise the speed limit in the config."
            ),
            ScanError::OutOfRange(why) => format!(
                "What happened: The energy range cannot be reached ({why}).\nLikely causes: An energy below the crystal's Bragg edge, or a run-up margin that pushes the actuator past 0 or 90 degrees.\nHow to fix: Pick energies above the edge for this crystal, or lower motion.run_up_scale / extra_run_up_deg."
            ),
            ScanError::PrepareFailed {
                cause: HardwareFault::Cancelled,
                ..
            }
            | ScanError::ExecuteFailed {
                cause: HardwareFault::Cancelled,
                ..
            } => "What happened: The scan was interrupted.\nLikely causes: Ctrl-C was pressed while the scan was starting or running.\nHow to fix: Nothing to fix; the trigger was disarmed and the speed restored. Rerun when ready.".to_string(),
            ScanError::PrepareFailed { step, cause } => format!(
                "What happened: Hardware setup failed at {step} ({cause}).\nLikely causes: The actuator rejected the command or the trigger module refused the gate.\nHow to fix: Check the devices are online and not armed by another client, then rerun."
            ),
            ScanError::ExecuteFailed {
                step,
                cause: HardwareFault::Timeout,
            } => format!(
                "What happened: The scan timed out at {step}.\nLikely causes: The actuator is stalled, jammed, or moving slower than commanded.\nHow to fix: Check the axis mechanics, then consider raising timeouts.in_position_ms or timeouts.run_down_ms."
            ),
            ScanError::ExecuteFailed { step, cause } => format!(
                "What happened: The scan failed at {step} ({cause}).\nLikely causes: A device fault while the sweep was starting or running.\nHow to fix: The trigger was disarmed and the speed restored; check the device logs, then rerun."
            ),
            ScanError::CleanupFailed(why) => format!(
                "What happened: Could not restore the hardware after the scan ({why}).\nLikely causes: The trigger module or actuator stopped responding.\nHow to fix: Disarm the trigger and reset the actuator speed manually before the next scan."
            ),
            ScanError::FrameRange { .. } | ScanError::Detector(_) => format!(
                "What happened: {se}.\nLikely causes: The detector recorded fewer frames than requested.\nHow to fix: Re-run with --log-level=debug to see the trigger pulse count."
            ),
            ScanError::InvalidState { .. } => format!(
                "What happened: {se}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML ({}).\nLikely causes: A typo, a missing quote, or a value of the wrong type.\nHow to fix: Fix the config file, then rerun.",
            te.message()
        );
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("crystal csv must have headers") {
        return "Invalid headers in crystal CSV. Expected 'crystal,d_spacing_angstrom'.".to_string();
    }

    if lower.contains("unknown crystal") || lower.contains("is not a preset") {
        return format!(
            "What happened: {msg}.\nLikely causes: A crystal name that is neither a preset nor listed in the crystal table.\nHow to fix: Use Si(111) or Si(311), set crystal.d_spacing_angstrom, or point crystal.table at a CSV."
        );
    }

    if lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: An out-of-range value in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per scan failure; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(se) = err.downcast_ref::<ScanError>() {
        return match se {
            ScanError::InvalidScanRequest(_) | ScanError::OutOfRange(_) => 3,
            ScanError::PrepareFailed {
                cause: HardwareFault::Cancelled,
                ..
            }
            | ScanError::ExecuteFailed {
                cause: HardwareFault::Cancelled,
                ..
            } => 130,
            ScanError::PrepareFailed { .. } => 4,
            ScanError::ExecuteFailed { .. } => 5,
            ScanError::CleanupFailed(_) => 6,
            ScanError::FrameRange { .. } | ScanError::Detector(_) => 7,
            ScanError::InvalidState { .. } => 1,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(se) = err.downcast_ref::<ScanError>() {
        let msg = humanize(err);
        let reason = scan_error_name(se);
        let step = match se {
            ScanError::PrepareFailed { step, .. } | ScanError::ExecuteFailed { step, .. } => {
                Some(*step)
            }
            _ => None,
        };
        let mut obj = json!({ "reason": reason, "exit_code": exit_code_for_error(err), "message": msg });
        if let Some(step) = step {
            obj["step"] = json!(step);
        }
        if let Some(r) = LAST_REQUEST.get() {
            obj["request"] = json!({
                "start_ev": r.start,
                "end_ev": r.end,
                "points": r.points,
                "time_s": r.time,
            });
        }
        return obj.to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "exit_code": exit_code_for_error(err), "message": humanize(err) })
        .to_string()
}
