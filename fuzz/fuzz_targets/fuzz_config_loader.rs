#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation may reject input but must never panic.
    let Ok(cfg) = flyscan_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config always converts into runtime settings.
    let motion: flyscan_core::MotionCfg = (&cfg.motion).into();
    assert!(motion.max_speed > 0.0);
    assert!(motion.run_up.scale_factor >= 1.0);
    let _ = flyscan_core::CrystalGeometry::try_from(&cfg.crystal);
});
